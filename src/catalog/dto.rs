use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct IngredientQuery {
    pub name: Option<String>,
}
