use uuid::Uuid;

use super::repo::ShoppingItem;
use crate::{error::ApiError, state::AppState};

pub const FILE_NAME: &str = "shopping_list.txt";

pub async fn shopping_list(st: &AppState, user: Uuid) -> Result<Vec<ShoppingItem>, ApiError> {
    st.shopping.shopping_list(user).await
}

/// Plain-text document, one numbered line per ingredient.
pub fn render(items: &[ShoppingItem]) -> String {
    let mut out = String::from("Shopping list\n");
    if items.is_empty() {
        out.push_str("\nYour shopping cart is empty.\n");
        return out;
    }
    out.push('\n');
    for (n, item) in items.iter().enumerate() {
        out.push_str(&format!(
            "{}. {} ({}) - {}\n",
            n + 1,
            item.name,
            item.measurement_unit,
            item.total_amount
        ));
    }
    out
}
