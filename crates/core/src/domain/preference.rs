use serde::{Deserialize, Serialize};

/// One extracted preference: a category label and its value. At most one
/// active value exists per (user, category); a collision overwrites.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Preference {
    pub category: String,
    pub preference: String,
}
