//! Pane payload models
//!
//! The fields carried here are exactly what the pane packets display.
//! Game rules for items, spells and skills live elsewhere.

use serde::{Deserialize, Serialize};

/// An inventory or equipment item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    /// Sprite id shown in the pane
    pub sprite: u16,
    /// Dye color
    pub color: u8,
    pub quantity: u32,
    pub stackable: bool,
    pub max_durability: u32,
    pub durability: u32,
}

impl Item {
    /// Create a single unstackable item
    pub fn new(name: impl Into<String>, sprite: u16) -> Self {
        Self {
            name: name.into(),
            sprite,
            color: 0,
            quantity: 1,
            stackable: false,
            max_durability: 0,
            durability: 0,
        }
    }

    pub fn with_color(mut self, color: u8) -> Self {
        self.color = color;
        self
    }

    /// Make the item a stack of `quantity`
    pub fn with_stack(mut self, quantity: u32) -> Self {
        self.stackable = true;
        self.quantity = quantity;
        self
    }

    pub fn with_durability(mut self, durability: u32, max_durability: u32) -> Self {
        self.durability = durability.min(max_durability);
        self.max_durability = max_durability;
        self
    }
}

/// A spell in the spell pane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spell {
    pub name: String,
    pub icon: u16,
    /// Targeting mode byte understood by the client
    pub spell_type: u8,
    /// Text shown when the spell asks for input
    pub prompt: String,
    /// Number of chant lines before the cast
    pub cast_lines: u8,
}

impl Spell {
    pub fn new(name: impl Into<String>, icon: u16) -> Self {
        Self {
            name: name.into(),
            icon,
            spell_type: 1,
            prompt: String::new(),
            cast_lines: 0,
        }
    }

    pub fn with_prompt(mut self, spell_type: u8, prompt: impl Into<String>) -> Self {
        self.spell_type = spell_type;
        self.prompt = prompt.into();
        self
    }

    pub fn with_cast_lines(mut self, cast_lines: u8) -> Self {
        self.cast_lines = cast_lines;
        self
    }
}

/// A skill in the skill pane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub icon: u16,
}

impl Skill {
    pub fn new(name: impl Into<String>, icon: u16) -> Self {
        Self {
            name: name.into(),
            icon,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_defaults() {
        let item = Item::new("Dirk", 0x8004);
        assert_eq!(item.quantity, 1);
        assert!(!item.stackable);
        assert_eq!(item.color, 0);
    }

    #[test]
    fn test_item_builders() {
        let item = Item::new("Apple", 12).with_stack(20).with_color(3);
        assert!(item.stackable);
        assert_eq!(item.quantity, 20);
        assert_eq!(item.color, 3);

        // Durability never exceeds the maximum
        let worn = Item::new("Shirt", 7).with_durability(150, 100);
        assert_eq!(worn.durability, 100);
        assert_eq!(worn.max_durability, 100);
    }

    #[test]
    fn test_spell_builders() {
        let spell = Spell::new("heal", 2)
            .with_prompt(2, "Whom?")
            .with_cast_lines(3);
        assert_eq!(spell.spell_type, 2);
        assert_eq!(spell.prompt, "Whom?");
        assert_eq!(spell.cast_lines, 3);
    }
}
