//! Normalization of model-produced recipe payloads.
//!
//! Model output for a recipe arrives in one of three shapes, decided once by
//! [`RecipePayload::classify`]:
//!
//! | Input                                                   | Variant     |
//! |---------------------------------------------------------|-------------|
//! | JSON object with a `recipe` object member               | `Nested`    |
//! | JSON object with `name`, `ingredients`, `instructions`  | `WellFormed`|
//! | anything else                                           | `FreeText`  |
//!
//! The upstream format is not guaranteed, so this is a best-effort contract.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

const GENERIC_STEPS: [&str; 3] = ["Combine all ingredients", "Cook until done", "Serve and enjoy"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
}

impl Ingredient {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            quantity: None,
            unit: None,
        }
    }

    /// `"2 eggs"` -> quantity `2`, name `eggs`. A single word is all name.
    pub fn from_text(text: &str) -> Self {
        let text = text.trim();
        match text.split_once(' ') {
            Some((quantity, name)) => Self {
                name: name.trim().to_string(),
                quantity: Some(quantity.to_string()),
                unit: None,
            },
            None => Self::named(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipe {
    pub name: String,
    pub ingredients: Vec<Ingredient>,
    pub instructions: Vec<String>,
    pub prep_time: Option<u32>,
    pub cook_time: Option<u32>,
    pub servings: Option<u32>,
    pub nutrition: Option<Value>,
}

/// The three shapes a recipe payload can take.
#[derive(Debug, Clone, PartialEq)]
pub enum RecipePayload {
    WellFormed(Recipe),
    Nested(Recipe),
    FreeText(String),
}

// Lenient wire shapes -------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum RawIngredient {
    Full(Ingredient),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSteps {
    List(Vec<String>),
    Text(String),
}

#[derive(Deserialize)]
struct RawRecipe {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    ingredients: Option<Vec<RawIngredient>>,
    #[serde(default)]
    instructions: Option<RawSteps>,
    #[serde(default)]
    prep_time: Option<u32>,
    #[serde(default)]
    cook_time: Option<u32>,
    #[serde(default)]
    servings: Option<u32>,
    #[serde(default)]
    nutrition: Option<Value>,
}

impl From<RawRecipe> for Recipe {
    fn from(raw: RawRecipe) -> Self {
        let ingredients = raw
            .ingredients
            .unwrap_or_default()
            .into_iter()
            .map(|i| match i {
                RawIngredient::Full(ingredient) => ingredient,
                RawIngredient::Text(text) => Ingredient::from_text(&text),
            })
            .filter(|i| !i.name.is_empty())
            .collect();
        let instructions = match raw.instructions {
            Some(RawSteps::List(steps)) => steps,
            Some(RawSteps::Text(text)) => text.lines().map(str::to_string).collect(),
            None => Vec::new(),
        }
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

        Recipe {
            name: raw.name.unwrap_or_default().trim().to_string(),
            ingredients,
            instructions,
            prep_time: raw.prep_time,
            cook_time: raw.cook_time,
            servings: raw.servings,
            nutrition: raw.nutrition,
        }
    }
}

impl RecipePayload {
    /// Decide the payload shape. Markdown code fences around JSON are ignored.
    pub fn classify(raw: &str) -> Self {
        let body = strip_fences(raw);
        let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) else {
            return Self::FreeText(raw.to_string());
        };

        if let Some(inner @ Value::Object(_)) = map.get("recipe") {
            return match serde_json::from_value::<RawRecipe>(inner.clone()) {
                Ok(recipe) => Self::Nested(recipe.into()),
                Err(e) => {
                    warn!("Nested recipe did not parse: {}", e);
                    Self::FreeText(raw.to_string())
                }
            };
        }

        let complete = ["name", "ingredients", "instructions"]
            .iter()
            .all(|key| map.contains_key(*key));
        if complete {
            match serde_json::from_value::<RawRecipe>(Value::Object(map)) {
                Ok(recipe) => return Self::WellFormed(recipe.into()),
                Err(e) => warn!("Recipe object did not parse: {}", e),
            }
        }
        Self::FreeText(raw.to_string())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::WellFormed(_) => "well_formed",
            Self::Nested(_) => "nested",
            Self::FreeText(_) => "free_text",
        }
    }

    /// Produce a usable recipe. Gaps are filled from `requested`, the
    /// ingredient list the recipe was asked for.
    pub fn into_recipe(self, requested: &[String]) -> Recipe {
        debug!("Resolving {} recipe payload", self.kind());
        match self {
            Self::WellFormed(recipe) | Self::Nested(recipe) => fill_gaps(recipe, requested),
            Self::FreeText(_) => fallback_recipe(requested),
        }
    }
}

/// Minimal recipe built only from the requested ingredients.
pub fn fallback_recipe(requested: &[String]) -> Recipe {
    let name = match requested.first() {
        Some(first) => format!("Quick {} Recipe", capitalize(first.trim())),
        None => "Quick Recipe".to_string(),
    };
    Recipe {
        name,
        ingredients: requested.iter().map(|i| Ingredient::named(i.trim())).collect(),
        instructions: GENERIC_STEPS.iter().map(|s| s.to_string()).collect(),
        prep_time: None,
        cook_time: None,
        servings: None,
        nutrition: None,
    }
}

fn fill_gaps(mut recipe: Recipe, requested: &[String]) -> Recipe {
    let fallback = fallback_recipe(requested);
    if recipe.name.is_empty() {
        recipe.name = fallback.name;
    }
    if recipe.ingredients.is_empty() {
        recipe.ingredients = fallback.ingredients;
    }
    if recipe.instructions.is_empty() {
        recipe.instructions = fallback.instructions;
    }
    recipe
}

impl Recipe {
    pub fn to_markdown(&self) -> String {
        let minutes = |v: Option<u32>| match v {
            Some(m) => format!("{} minutes", m),
            None => "Not specified".to_string(),
        };
        let mut out = format!("## {}\n\n", self.name);
        out.push_str(&format!("**Preparation Time:** {}\n", minutes(self.prep_time)));
        out.push_str(&format!("**Cooking Time:** {}\n", minutes(self.cook_time)));
        out.push_str(&format!(
            "**Servings:** {}\n",
            self.servings
                .map(|s| s.to_string())
                .unwrap_or_else(|| "Not specified".into())
        ));

        out.push_str("\n### Ingredients\n");
        for ing in &self.ingredients {
            let parts: Vec<&str> = [ing.quantity.as_deref(), ing.unit.as_deref(), Some(ing.name.as_str())]
                .into_iter()
                .flatten()
                .filter(|p| !p.is_empty())
                .collect();
            out.push_str(&format!("- {}\n", parts.join(" ")));
        }

        out.push_str("\n### Instructions\n");
        for (i, step) in self.instructions.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, step));
        }
        out
    }
}

fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening fence line.
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requested() -> Vec<String> {
        vec!["chicken".into(), "rice".into()]
    }

    #[test]
    fn well_formed_object() {
        let payload = RecipePayload::classify(
            r#"{"name": "Fried Rice", "ingredients": [{"name": "rice", "quantity": "2", "unit": "cups"}, "3 eggs"], "instructions": ["Cook rice", "Fry"], "servings": 2}"#,
        );
        let RecipePayload::WellFormed(recipe) = &payload else {
            panic!("expected well-formed, got {}", payload.kind());
        };
        assert_eq!(recipe.ingredients[1], Ingredient {
            name: "eggs".into(),
            quantity: Some("3".into()),
            unit: None,
        });
        assert_eq!(recipe.servings, Some(2));
    }

    #[test]
    fn nested_recipe_member_wins() {
        let payload = RecipePayload::classify(
            "```json\n{\"recipe\": {\"ingredients\": [\"1 onion\"], \"instructions\": \"Chop\\n\\nFry\"}, \"name\": \"ignored\"}\n```",
        );
        assert_eq!(payload.kind(), "nested");
        let recipe = payload.into_recipe(&requested());
        assert_eq!(recipe.name, "Quick Chicken Recipe");
        assert_eq!(recipe.instructions, ["Chop", "Fry"]);
        assert_eq!(recipe.ingredients[0].name, "onion");
    }

    #[test]
    fn everything_else_is_free_text() {
        for raw in [
            "Here is a lovely recipe for you!",
            r#"{"result": "a recipe"}"#,
            r#"{"name": "x", "ingredients": 5, "instructions": []}"#,
            "[1, 2, 3]",
        ] {
            assert_eq!(RecipePayload::classify(raw).kind(), "free_text", "{raw}");
        }
    }

    #[test]
    fn free_text_falls_back() {
        let recipe = RecipePayload::classify("no json here").into_recipe(&["tOFU".to_string()]);
        assert_eq!(recipe.name, "Quick Tofu Recipe");
        assert_eq!(recipe.ingredients, [Ingredient::named("tOFU")]);
        assert_eq!(recipe.instructions.len(), 3);

        assert_eq!(fallback_recipe(&[]).name, "Quick Recipe");
    }

    #[test]
    fn markdown_layout() {
        let recipe = Recipe {
            name: "Rice".into(),
            ingredients: vec![
                Ingredient {
                    name: "rice".into(),
                    quantity: Some("2".into()),
                    unit: Some("cups".into()),
                },
                Ingredient::named("salt"),
            ],
            instructions: vec!["Boil".into(), "Serve".into()],
            prep_time: Some(5),
            cook_time: None,
            servings: None,
            nutrition: None,
        };
        assert_eq!(
            recipe.to_markdown(),
            "## Rice\n\n**Preparation Time:** 5 minutes\n**Cooking Time:** Not specified\n**Servings:** Not specified\n\n### Ingredients\n- 2 cups rice\n- salt\n\n### Instructions\n1. Boil\n2. Serve\n"
        );
    }
}
