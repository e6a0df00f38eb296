use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Peg colors. On the wire every color is its single letter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Color {
    #[serde(rename = "R")]
    Red,
    #[serde(rename = "O")]
    Orange,
    #[serde(rename = "Y")]
    Yellow,
    #[serde(rename = "G")]
    Green,
    #[serde(rename = "B")]
    Blue,
    #[serde(rename = "P")]
    Pink,
    #[serde(rename = "U")]
    Purple,
}

impl Color {
    pub const ALL: [Color; 7] = [
        Color::Red,
        Color::Orange,
        Color::Yellow,
        Color::Green,
        Color::Blue,
        Color::Pink,
        Color::Purple,
    ];

    pub fn letter(&self) -> char {
        match self {
            Color::Red => 'R',
            Color::Orange => 'O',
            Color::Yellow => 'Y',
            Color::Green => 'G',
            Color::Blue => 'B',
            Color::Pink => 'P',
            Color::Purple => 'U',
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        Color::ALL
            .into_iter()
            .find(|c| c.letter() == letter.to_ascii_uppercase())
    }

    /// display color used by renderers
    pub fn display_name(&self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Orange => "orange",
            Color::Yellow => "yellow",
            Color::Green => "green",
            Color::Blue => "blue",
            Color::Pink => "pink",
            Color::Purple => "purple",
        }
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for Color {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(letter), None) => Color::from_letter(letter)
                .ok_or_else(|| anyhow::Error::msg(format!("unknown color `{}`", s))),
            _ => Err(anyhow::Error::msg(format!("unknown color `{}`", s))),
        }
    }
}

#[cfg(test)]
mod test_color {
    use super::*;

    #[test]
    fn test_letters_are_distinct() {
        for color in Color::ALL {
            assert_eq!(Color::from_letter(color.letter()), Some(color));
        }
        assert_eq!(Color::from_letter('u'), Some(Color::Purple));
        assert_eq!(Color::from_letter('W'), None);
    }

    #[test]
    fn test_parse() {
        assert_eq!("G".parse::<Color>().unwrap(), Color::Green);
        assert_eq!(" p ".parse::<Color>().unwrap(), Color::Pink);
        assert!("GR".parse::<Color>().is_err());
        assert!("".parse::<Color>().is_err());
    }

    #[test]
    fn test_wire_form() {
        assert_eq!(serde_json::to_string(&Color::Purple).unwrap(), "\"U\"");
        let color: Color = serde_json::from_str("\"O\"").unwrap();
        assert_eq!(color, Color::Orange);
    }
}
