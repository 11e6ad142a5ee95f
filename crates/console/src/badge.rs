//! Design-system badge: a short label with color, variant, radius and
//! margin props, serialized the way the component library expects them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeVariant {
    Solid,
    Soft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeRadius {
    None,
    Small,
    Medium,
    Large,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeColor {
    Gray,
    Violet,
    Blue,
    Green,
    Amber,
    Orange,
    Red,
    Teal,
}

/// Margin props on the design-system scale (`"0"`..`"9"`, `"auto"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Margin {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub m: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mx: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mb: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ml: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<BadgeColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<BadgeVariant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius: Option<BadgeRadius>,
    #[serde(flatten)]
    pub margin: Margin,
}

impl Badge {
    /// A badge with library defaults for everything but the label.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            title: None,
            color: None,
            variant: None,
            radius: None,
            margin: Margin::default(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn color(mut self, color: BadgeColor) -> Self {
        self.color = Some(color);
        self
    }

    pub fn variant(mut self, variant: BadgeVariant) -> Self {
        self.variant = Some(variant);
        self
    }

    pub fn radius(mut self, radius: BadgeRadius) -> Self {
        self.radius = Some(radius);
        self
    }

    pub fn ml(mut self, step: impl Into<String>) -> Self {
        self.margin.ml = Some(step.into());
        self
    }
}
