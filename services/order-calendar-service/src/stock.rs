// =============================================================================
// STOCK MODULE
// =============================================================================
// Keeps decoration character counts in step with the orders that use them.
//
// RULES:
// - Saving an order deducts its decorations (clamped at zero)
// - Editing an order restores the usage it had, then deducts the new usage
// - Deleting an order restores its usage before the row goes away
// - Usage that points at a character no longer in stock is skipped
//
// The functions here work on an in-memory slice of the owner's stock items.
// Gateways load the items, apply `reconcile` and write the result back in
// one transaction.
// =============================================================================

use crate::error::{AppError, AppResult};
use crate::models::{Decoration, DecorationChoice, StockItem};

// -----------------------------------------------------------------------------
// MATCHING
// -----------------------------------------------------------------------------
/// Decorations picked through the selection check carry the stock item id;
/// older ones only carry the character.
pub fn refers_to(usage: &Decoration, item: &StockItem) -> bool {
    match usage.stock_item_id {
        Some(id) => id == item.id,
        None => usage.character == item.character,
    }
}

fn find_mut<'a>(items: &'a mut [StockItem], usage: &Decoration) -> Option<&'a mut StockItem> {
    items.iter_mut().find(|item| refers_to(usage, item))
}

// -----------------------------------------------------------------------------
// DEDUCT / RESTORE
// -----------------------------------------------------------------------------

/// Take `usage` out of stock. Quantities never go below zero.
pub fn deduct(items: &mut [StockItem], usage: &[Decoration]) {
    for entry in usage {
        match find_mut(items, entry) {
            Some(item) => {
                item.quantity = item.quantity.saturating_sub(entry.quantity).max(0);
            }
            None => {
                tracing::debug!(character = %entry.character, "Deduct skipped, no stock item");
            }
        }
    }
}

/// Put `usage` back into stock.
pub fn restore(items: &mut [StockItem], usage: &[Decoration]) {
    for entry in usage {
        match find_mut(items, entry) {
            Some(item) => {
                item.quantity = item.quantity.saturating_add(entry.quantity);
            }
            None => {
                tracing::debug!(character = %entry.character, "Restore skipped, no stock item");
            }
        }
    }
}

/// Restore what an order used before, then deduct what it uses now.
/// Creating passes an empty `old`, deleting an empty `new`.
pub fn reconcile(items: &mut [StockItem], old: &[Decoration], new: &[Decoration]) {
    restore(items, old);
    deduct(items, new);
}

/// +/- buttons on the stock page
pub fn adjusted_quantity(current: i32, delta: i32) -> i32 {
    current.saturating_add(delta).max(0)
}

/// Character and starting quantity for a new stock row
pub fn new_item_fields(character: &str, quantity: i32) -> AppResult<(String, i32)> {
    let character = character.trim();
    if character.is_empty() {
        return Err(AppError::validation("Please enter a character"));
    }
    if quantity < 0 {
        return Err(AppError::validation("Quantity must be zero or more"));
    }
    Ok((character.to_string(), quantity))
}

// -----------------------------------------------------------------------------
// SELECTION-TIME AVAILABILITY
// -----------------------------------------------------------------------------

/// Quantity of `item` already picked in a draft selection.
/// Summed as i64: the selection comes from the client.
pub fn selected_quantity(selected: &[Decoration], item: &StockItem) -> i64 {
    selected
        .iter()
        .filter(|entry| refers_to(entry, item))
        .map(|entry| i64::from(entry.quantity))
        .sum()
}

/// Checks `already selected + requested <= in stock` for one character.
///
/// Only guards the order form; the final deduct still clamps at zero, and
/// two sessions editing at once are not coordinated.
pub fn check_availability<'a>(
    stock: &'a [StockItem],
    selected: &[Decoration],
    character: &str,
    requested: i32,
) -> AppResult<&'a StockItem> {
    if requested < 1 || selected.iter().any(|entry| entry.quantity < 1) {
        return Err(AppError::validation("Decoration quantity must be at least 1"));
    }

    let item = stock
        .iter()
        .find(|item| item.character == character)
        .ok_or_else(|| AppError::validation(format!("\"{}\" is not in your stock", character)))?;

    let in_stock = i64::from(item.quantity);
    let already = selected_quantity(selected, item);
    if already + i64::from(requested) > in_stock {
        let available = (in_stock - already).clamp(0, in_stock);
        return Err(AppError::InsufficientStock {
            character: character.to_string(),
            available: i32::try_from(available).unwrap_or(0),
            requested,
        });
    }

    Ok(item)
}

// =============================================================================
// DECORATION DRAFT
// =============================================================================
/// Decorations picked so far for an order that is being created or edited.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecorationDraft {
    selected: Vec<Decoration>,
}

impl DecorationDraft {
    pub fn new(selected: Vec<Decoration>) -> Self {
        Self { selected }
    }

    /// Adds `quantity` of `character`, merging with an existing entry.
    /// On rejection the draft is left untouched.
    pub fn add(&mut self, stock: &[StockItem], character: &str, quantity: i32) -> AppResult<()> {
        let item = check_availability(stock, &self.selected, character, quantity)?;

        match self.selected.iter_mut().find(|entry| refers_to(entry, item)) {
            Some(existing) => {
                existing.quantity += quantity;
                existing.stock_item_id = Some(item.id);
            }
            None => self.selected.push(Decoration {
                character: item.character.clone(),
                quantity,
                stock_item_id: Some(item.id),
            }),
        }
        Ok(())
    }

    pub fn into_selected(self) -> Vec<Decoration> {
        self.selected
    }

    /// Dropdown entries: stock minus what the draft already holds, > 0 only
    pub fn choices(&self, stock: &[StockItem]) -> Vec<DecorationChoice> {
        stock
            .iter()
            .filter_map(|item| {
                let available = i64::from(item.quantity) - selected_quantity(&self.selected, item);
                let available = i32::try_from(available).ok().filter(|left| *left > 0)?;
                Some(DecorationChoice {
                    stock_item_id: item.id,
                    character: item.character.clone(),
                    available,
                })
            })
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn item(character: &str, quantity: i32) -> StockItem {
        StockItem {
            id: Uuid::new_v4(),
            character: character.to_string(),
            quantity,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn deduct_then_restore_returns_to_original_quantity() {
        for (quantity, used) in [(5, 0), (5, 2), (5, 5), (1, 1), (40, 17)] {
            let mut stock = vec![item("A", quantity)];
            let usage = vec![Decoration::new("A", used)];

            deduct(&mut stock, &usage);
            assert_eq!(stock[0].quantity, quantity - used);
            restore(&mut stock, &usage);
            assert_eq!(stock[0].quantity, quantity);
        }
    }

    #[test]
    fn deduct_clamps_at_zero() {
        let mut stock = vec![item("A", 2)];
        deduct(&mut stock, &[Decoration::new("A", 5)]);
        assert_eq!(stock[0].quantity, 0);
    }

    #[test]
    fn unknown_characters_are_skipped() {
        let mut stock = vec![item("A", 3)];
        deduct(&mut stock, &[Decoration::new("Z", 2), Decoration::new("A", 1)]);
        restore(&mut stock, &[Decoration::new("♥", 4)]);
        assert_eq!(stock[0].quantity, 2);
    }

    #[test]
    fn reconcile_restores_before_deducting() {
        let mut stock = vec![item("A", 3)];
        reconcile(&mut stock, &[Decoration::new("A", 2)], &[Decoration::new("A", 1)]);
        assert_eq!(stock[0].quantity, 4);

        // Deducting first would clamp at zero and lose two units
        let mut stock = vec![item("B", 1)];
        reconcile(&mut stock, &[Decoration::new("B", 3)], &[Decoration::new("B", 4)]);
        assert_eq!(stock[0].quantity, 0);
    }

    #[test]
    fn stock_item_id_wins_over_character() {
        let renamed = StockItem {
            character: "a".into(),
            ..item("A", 5)
        };
        let mut stock = vec![renamed.clone(), item("A", 5)];
        let usage = Decoration {
            character: "A".into(),
            quantity: 2,
            stock_item_id: Some(renamed.id),
        };

        deduct(&mut stock, &[usage]);
        assert_eq!(stock[0].quantity, 3);
        assert_eq!(stock[1].quantity, 5);
    }

    #[test]
    fn deleted_stock_item_id_is_skipped() {
        let mut stock = vec![item("A", 5)];
        let usage = Decoration {
            character: "A".into(),
            quantity: 2,
            stock_item_id: Some(Uuid::new_v4()),
        };
        deduct(&mut stock, &[usage]);
        assert_eq!(stock[0].quantity, 5);
    }

    #[test]
    fn adjusted_quantity_never_negative() {
        assert_eq!(adjusted_quantity(3, 1), 4);
        assert_eq!(adjusted_quantity(0, -1), 0);
        assert_eq!(adjusted_quantity(2, -5), 0);
    }

    #[test]
    fn availability_counts_already_selected() {
        let stock = vec![item("A", 3)];
        let selected = vec![Decoration::new("A", 2)];

        assert!(check_availability(&stock, &selected, "A", 1).is_ok());

        let err = check_availability(&stock, &selected, "A", 2).unwrap_err();
        match err {
            AppError::InsufficientStock {
                character,
                available,
                requested,
            } => {
                assert_eq!(character, "A");
                assert_eq!(available, 1);
                assert_eq!(requested, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(matches!(
            check_availability(&stock, &[], "A", 0),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            check_availability(&stock, &[], "Q", 1),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn draft_merges_and_captures_stock_item_id() {
        let stock = vec![item("A", 5), item("★", 1)];
        let mut draft = DecorationDraft::default();

        draft.add(&stock, "A", 2).unwrap();
        draft.add(&stock, "A", 1).unwrap();
        draft.add(&stock, "★", 1).unwrap();

        let choices = draft.choices(&stock);
        assert_eq!(choices.len(), 1);
        assert_eq!(choices[0].character, "A");
        assert_eq!(choices[0].available, 2);

        let selected = draft.into_selected();
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].quantity, 3);
        assert_eq!(selected[0].stock_item_id, Some(stock[0].id));
    }

    #[test]
    fn huge_selected_quantities_do_not_overflow_the_check() {
        let stock = vec![item("A", 3)];
        let selected = vec![Decoration::new("A", i32::MAX), Decoration::new("A", i32::MAX)];

        match check_availability(&stock, &selected, "A", 1) {
            Err(AppError::InsufficientStock { available, .. }) => assert_eq!(available, 0),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(DecorationDraft::new(selected).choices(&stock).is_empty());
    }

    #[test]
    fn non_positive_selected_entries_are_rejected() {
        let stock = vec![item("A", 3)];

        let mut draft = DecorationDraft::new(vec![Decoration::new("A", -100)]);
        let before = draft.clone();
        assert!(matches!(
            draft.add(&stock, "A", 50),
            Err(AppError::Validation(_))
        ));
        assert_eq!(draft, before);

        assert!(matches!(
            check_availability(&stock, &[Decoration::new("A", 0)], "A", 1),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn rejected_add_leaves_draft_unchanged() {
        let stock = vec![item("A", 2)];
        let mut draft = DecorationDraft::new(vec![Decoration::new("A", 2)]);
        let before = draft.clone();

        assert!(draft.add(&stock, "A", 1).is_err());
        assert_eq!(draft, before);
        assert_eq!(draft.into_selected(), vec![Decoration::new("A", 2)]);
    }

    #[test]
    fn new_stock_character_is_trimmed_and_required() {
        assert_eq!(new_item_fields(" B ", 4).unwrap(), ("B".to_string(), 4));
        assert!(matches!(
            new_item_fields("   ", 4),
            Err(AppError::Validation(_))
        ));
        assert!(new_item_fields("B", -1).is_err());
    }
}
