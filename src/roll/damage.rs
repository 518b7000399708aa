use super::{DefaultRoller, EvalOptions, FormulaError, Roll, Roller};
use crate::common::Number;
use crate::data::RollData;
use serde::{Deserialize, Serialize};

/// Damage classification discriminator.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DamageClass {
    Normal,
    Critical,
    NonCritical,
}

impl Default for DamageClass {
    fn default() -> Self {
        Self::Normal
    }
}

/// Typed damage metadata: one or more type keys plus free text.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct DamageType {
    pub values: Vec<String>,
    pub custom: String,
}

impl DamageType {
    fn normalize(mut self) -> Self {
        if self.values.is_empty() {
            self.values.push("untyped".to_owned());
        }
        self
    }
}

impl Default for DamageType {
    fn default() -> Self {
        Self {
            values: vec!["untyped".to_owned()],
            custom: String::new(),
        }
    }
}

/// A roll carrying damage metadata. No evaluation behavior beyond the
/// base roll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageRoll {
    roll: Roll,
    pub damage_type: DamageType,
    pub class: DamageClass,
}

impl DamageRoll {
    pub fn new(
        formula: &str,
        data: &RollData,
        damage_type: DamageType,
        class: DamageClass,
    ) -> Result<Self, FormulaError> {
        Ok(Self {
            roll: Roll::parse(formula, data)?,
            damage_type: damage_type.normalize(),
            class,
        })
    }

    pub fn is_critical(&self) -> bool {
        self.class == DamageClass::Critical
    }

    pub fn evaluate(&mut self) -> Result<Number, FormulaError> {
        self.evaluate_with(&mut DefaultRoller::default(), &EvalOptions::default())
    }

    pub fn evaluate_with(
        &mut self,
        roller: &mut dyn Roller,
        opts: &EvalOptions,
    ) -> Result<Number, FormulaError> {
        self.roll.evaluate_with(roller, opts)
    }

    pub async fn evaluate_async(&mut self) -> Result<Number, FormulaError> {
        let mut roller = DefaultRoller::default();
        self.roll
            .evaluate_async_with(&mut roller, &EvalOptions::default())
            .await
    }

    pub async fn evaluate_async_with(
        &mut self,
        roller: &mut dyn Roller,
        opts: &EvalOptions,
    ) -> Result<Number, FormulaError> {
        self.roll.evaluate_async_with(roller, opts).await
    }

    pub fn total(&self) -> Result<Number, FormulaError> {
        self.roll.total()
    }

    pub fn formula(&self) -> String {
        self.roll.formula()
    }

    pub fn roll(&self) -> &Roll {
        &self.roll
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roll::StepRoller;

    #[test]
    fn test_defaults() {
        let mut dmg = DamageRoll::new(
            "2d6 + 3",
            &RollData::new(),
            DamageType::default(),
            DamageClass::default(),
        )
        .unwrap();
        assert_eq!(dmg.damage_type.values, vec!["untyped".to_owned()]);
        assert!(!dmg.is_critical());

        let mut roller = StepRoller::new(4, 1);
        dmg.evaluate_with(&mut roller, &EvalOptions::default()).unwrap();
        assert_eq!(dmg.total().unwrap(), Number::Int(12));
    }

    #[test]
    fn test_empty_type_list_normalizes() {
        let dmg = DamageRoll::new(
            "1d4",
            &RollData::new(),
            DamageType {
                values: Vec::new(),
                custom: "searing".to_owned(),
            },
            DamageClass::Critical,
        )
        .unwrap();
        assert_eq!(dmg.damage_type.values, vec!["untyped".to_owned()]);
        assert_eq!(dmg.damage_type.custom, "searing");
        assert!(dmg.is_critical());
    }
}
