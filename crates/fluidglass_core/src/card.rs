//! Glass card registry
//!
//! A glass card is a rounded rectangle in normalised surface coordinates:
//! `x`/`y` locate the centre with `y` measured from the bottom edge, and
//! `width`/`height` are full extents in the same units. Corner radius is in
//! the same normalised units and is aspect-scaled by the compositor.
//!
//! Cards are addressed by [`CardId`], a generation-tagged key that stays valid
//! across removal of other cards. Draw order is insertion order.

use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Stable handle to a registered glass card
    pub struct CardId;
}

/// A registered glass region
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlassCard {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub corner_radius: f32,
}

impl Default for GlassCard {
    fn default() -> Self {
        Self {
            x: 0.5,
            y: 0.5,
            width: 0.3,
            height: 0.15,
            corner_radius: 0.02,
        }
    }
}

impl GlassCard {
    /// Merge the fields present in `patch`
    pub fn apply(&mut self, patch: &CardPatch) {
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(width) = patch.width {
            self.width = width;
        }
        if let Some(height) = patch.height {
            self.height = height;
        }
        if let Some(corner_radius) = patch.corner_radius {
            self.corner_radius = corner_radius;
        }
    }

    /// Centre and size packed as `[x, y, width, height]`
    pub fn rect(&self) -> [f32; 4] {
        [self.x, self.y, self.width, self.height]
    }
}

impl From<CardPatch> for GlassCard {
    fn from(patch: CardPatch) -> Self {
        let mut card = GlassCard::default();
        card.apply(&patch);
        card
    }
}

/// Partial card fields; `None` keeps the existing (or default) value
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CardPatch {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub corner_radius: Option<f32>,
}

impl CardPatch {
    pub fn position(x: f32, y: f32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Default::default()
        }
    }

    pub fn size(width: f32, height: f32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Default::default()
        }
    }
}

impl From<GlassCard> for CardPatch {
    fn from(card: GlassCard) -> Self {
        Self {
            x: Some(card.x),
            y: Some(card.y),
            width: Some(card.width),
            height: Some(card.height),
            corner_radius: Some(card.corner_radius),
        }
    }
}

/// Ordered set of glass cards
#[derive(Debug, Default)]
pub struct CardRegistry {
    cards: SlotMap<CardId, GlassCard>,
    order: Vec<CardId>,
}

impl CardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a card, filling missing fields with defaults
    pub fn add(&mut self, patch: CardPatch) -> CardId {
        let id = self.cards.insert(GlassCard::from(patch));
        self.order.push(id);
        tracing::debug!("Added glass card {:?} ({} total)", id, self.order.len());
        id
    }

    /// Remove a card; unknown or stale ids are ignored
    pub fn remove(&mut self, id: CardId) -> Option<GlassCard> {
        let card = self.cards.remove(id)?;
        self.order.retain(|&other| other != id);
        Some(card)
    }

    /// Merge `patch` into an existing card; returns false for unknown ids
    pub fn update(&mut self, id: CardId, patch: &CardPatch) -> bool {
        match self.cards.get_mut(id) {
            Some(card) => {
                card.apply(patch);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.cards.clear();
        self.order.clear();
    }

    pub fn get(&self, id: CardId) -> Option<&GlassCard> {
        self.cards.get(id)
    }

    /// Current draw position of a card
    pub fn index_of(&self, id: CardId) -> Option<usize> {
        self.order.iter().position(|&other| other == id)
    }

    /// Card id at a draw position
    pub fn id_at(&self, index: usize) -> Option<CardId> {
        self.order.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterate cards in draw order
    pub fn iter(&self) -> impl Iterator<Item = (CardId, &GlassCard)> + '_ {
        self.order
            .iter()
            .filter_map(move |&id| self.cards.get(id).map(|card| (id, card)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_fills_defaults() {
        let mut registry = CardRegistry::new();
        let id = registry.add(CardPatch {
            width: Some(0.5),
            ..Default::default()
        });

        let card = registry.get(id).unwrap();
        assert_eq!(card.width, 0.5);
        assert_eq!(card.x, 0.5);
        assert_eq!(card.y, 0.5);
        assert_eq!(card.height, 0.15);
        assert_eq!(card.corner_radius, 0.02);
    }

    #[test]
    fn test_positions_increase_in_insertion_order() {
        let mut registry = CardRegistry::new();
        let ids: Vec<_> = (0..4).map(|_| registry.add(CardPatch::default())).collect();

        for (expected, id) in ids.iter().enumerate() {
            assert_eq!(registry.index_of(*id), Some(expected));
            assert_eq!(registry.id_at(expected), Some(*id));
        }
    }

    #[test]
    fn test_update_touches_only_target() {
        let mut registry = CardRegistry::new();
        let a = registry.add(CardPatch::position(0.2, 0.2));
        let b = registry.add(CardPatch::position(0.8, 0.8));
        let before = *registry.get(a).unwrap();

        assert!(registry.update(b, &CardPatch::size(0.1, 0.4)));

        assert_eq!(*registry.get(a).unwrap(), before);
        let updated = registry.get(b).unwrap();
        assert_eq!(updated.rect(), [0.8, 0.8, 0.1, 0.4]);
        assert_eq!(updated.corner_radius, 0.02);
    }

    #[test]
    fn test_ids_survive_earlier_removal() {
        let mut registry = CardRegistry::new();
        let a = registry.add(CardPatch::position(0.1, 0.1));
        let b = registry.add(CardPatch::position(0.9, 0.9));

        assert!(registry.remove(a).is_some());
        assert_eq!(registry.index_of(b), Some(0));
        assert_eq!(registry.get(b).unwrap().x, 0.9);

        // Stale handle is a no-op, not an error
        assert!(registry.remove(a).is_none());
        assert!(!registry.update(a, &CardPatch::position(0.0, 0.0)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_stale_id_does_not_alias_new_card() {
        let mut registry = CardRegistry::new();
        let a = registry.add(CardPatch::default());
        registry.remove(a);
        let b = registry.add(CardPatch::default());

        assert_ne!(a, b);
        assert!(registry.get(a).is_none());
        assert!(registry.get(b).is_some());
    }

    #[test]
    fn test_clear_and_iteration_order() {
        let mut registry = CardRegistry::new();
        registry.add(CardPatch::position(0.3, 0.3));
        registry.add(CardPatch::position(0.6, 0.6));

        let xs: Vec<f32> = registry.iter().map(|(_, card)| card.x).collect();
        assert_eq!(xs, vec![0.3, 0.6]);

        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.iter().count(), 0);
    }

    #[test]
    fn test_patch_deserializes_camel_case() {
        let patch: CardPatch = serde_json::from_str(r#"{"x": 0.25, "cornerRadius": 0.05}"#).unwrap();
        let card = GlassCard::from(patch);
        assert_eq!(card.x, 0.25);
        assert_eq!(card.corner_radius, 0.05);
        assert_eq!(card.width, 0.3);
    }
}
