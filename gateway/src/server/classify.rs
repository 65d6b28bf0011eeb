use common::comm::{MatchBasis, Payload, Role};

/// Payload fields that only the nutrient node reports.
pub const DISSOLVED_SOLIDS_FIELDS: [&str; 1] = ["tds_ppm"];

/// Payload fields that only the soil / climate node reports.
pub const CLIMATE_FIELDS: [&str; 3] = ["soil_pct", "temp_c", "lux"];

/// A condition under which a classification rule applies.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
  /// The device identifier is exactly this string.
  DeviceId(String),

  /// The payload carries at least one of these fields, whatever its value.
  AnyField(Vec<String>),
}

impl Predicate {
  /// Builds an `AnyField` predicate from a list of field names.
  pub fn any_field(fields: &[&str]) -> Self {
    Predicate::AnyField(fields.iter().map(|&field| field.to_owned()).collect())
  }

  fn matches(&self, device_id: &str, payload: &Payload) -> bool {
    match self {
      Self::DeviceId(id) => id == device_id,
      Self::AnyField(fields) => {
        fields.iter().any(|field| payload.contains_key(field))
      }
    }
  }

  fn basis(&self) -> MatchBasis {
    match self {
      Self::DeviceId(_) => MatchBasis::Identity,
      Self::AnyField(_) => MatchBasis::Shape,
    }
  }
}

/// A single row of the classification table.
#[derive(Clone, Debug, PartialEq)]
pub struct Rule {
  /// When the rule applies.
  pub predicate: Predicate,

  /// The role assigned when it does.
  pub role: Role,
}

/// The outcome of classifying one uplink.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Classification {
  /// The assigned role.
  pub role: Role,

  /// Which kind of rule decided it.
  pub basis: MatchBasis,
}

/// Maps a device identifier and decoded payload to a role by evaluating an
/// ordered rule table top to bottom. The first matching rule wins and
/// anything left over is `Role::Unknown`, so classification never fails.
#[derive(Clone, Debug, PartialEq)]
pub struct Classifier {
  rules: Vec<Rule>,
}

impl Classifier {
  /// The standard table: configured identities first, then payload shape,
  /// with dissolved solids checked before the climate fields.
  pub fn new(node1_id: &str, node2_id: &str) -> Self {
    Classifier::from_rules(vec![
      Rule {
        predicate: Predicate::DeviceId(node1_id.to_owned()),
        role: Role::Node1,
      },
      Rule {
        predicate: Predicate::DeviceId(node2_id.to_owned()),
        role: Role::Node2,
      },
      Rule {
        predicate: Predicate::any_field(&DISSOLVED_SOLIDS_FIELDS),
        role: Role::Node2,
      },
      Rule {
        predicate: Predicate::any_field(&CLIMATE_FIELDS),
        role: Role::Node1,
      },
    ])
  }

  /// Uses a custom rule table, evaluated in the given order.
  pub fn from_rules(rules: Vec<Rule>) -> Self {
    Classifier { rules }
  }

  /// Classifies a single uplink.
  pub fn classify(&self, device_id: &str, payload: &Payload) -> Classification {
    self
      .rules
      .iter()
      .find(|rule| rule.predicate.matches(device_id, payload))
      .map(|rule| Classification {
        role: rule.role,
        basis: rule.predicate.basis(),
      })
      .unwrap_or(Classification {
        role: Role::Unknown,
        basis: MatchBasis::Fallback,
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn payload(value: serde_json::Value) -> Payload {
    serde_json::from_value(value).unwrap()
  }

  fn classifier() -> Classifier {
    Classifier::new("node1", "node2")
  }

  #[test]
  fn dissolved_solids_is_second_role() {
    let classification =
      classifier().classify("probe-07", &payload(json!({ "tds_ppm": 540 })));

    assert_eq!(classification.role, Role::Node2);
    assert_eq!(classification.basis, MatchBasis::Shape);
  }

  #[test]
  fn climate_fields_are_first_role() {
    for field in CLIMATE_FIELDS {
      let classification =
        classifier().classify("greenhouse-b", &payload(json!({ field: 1 })));

      assert_eq!(classification.role, Role::Node1, "field {field}");
      assert_eq!(classification.basis, MatchBasis::Shape);
    }
  }

  #[test]
  fn dissolved_solids_checked_before_climate() {
    let classification = classifier()
      .classify("mixed", &payload(json!({ "temp_c": 21.0, "tds_ppm": 500 })));

    assert_eq!(classification.role, Role::Node2);
  }

  #[test]
  fn presence_counts_even_when_null() {
    let classification =
      classifier().classify("probe-07", &payload(json!({ "tds_ppm": null })));

    assert_eq!(classification.role, Role::Node2);
  }

  #[test]
  fn identity_beats_shape() {
    let first =
      classifier().classify("node1", &payload(json!({ "tds_ppm": 500 })));
    let second =
      classifier().classify("node2", &payload(json!({ "soil_pct": 30 })));

    assert_eq!(first.role, Role::Node1);
    assert_eq!(first.basis, MatchBasis::Identity);
    assert_eq!(second.role, Role::Node2);
    assert_eq!(second.basis, MatchBasis::Identity);
  }

  #[test]
  fn identity_matches_exactly() {
    let classification =
      classifier().classify("Node1", &payload(json!({ "battery_v": 3.7 })));

    assert_eq!(classification.role, Role::Unknown);
  }

  #[test]
  fn everything_else_is_unknown() {
    for value in [json!({}), json!({ "battery_v": 3.7, "buzzer": true })] {
      let classification = classifier().classify("stray-01", &payload(value));

      assert_eq!(classification.role, Role::Unknown);
      assert_eq!(classification.basis, MatchBasis::Fallback);
    }
  }

  #[test]
  fn custom_tables_keep_their_order() {
    let classifier = Classifier::from_rules(vec![
      Rule {
        predicate: Predicate::any_field(&["lux"]),
        role: Role::Node2,
      },
      Rule {
        predicate: Predicate::DeviceId("node1".to_owned()),
        role: Role::Node1,
      },
    ]);

    let classification = classifier.classify("node1", &payload(json!({ "lux": 5 })));
    assert_eq!(classification.role, Role::Node2);
  }
}
