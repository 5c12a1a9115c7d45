use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Minimum figures any quote, counter or accepted offer must cover.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostFloor {
    pub implementation: Decimal,
    pub recurring: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FloorBreach {
    pub implementation_shortfall: Option<Decimal>,
    pub recurring_shortfall: Option<Decimal>,
}

impl CostFloor {
    pub fn check(&self, implementation: Decimal, recurring: Decimal) -> Result<(), FloorBreach> {
        let implementation_shortfall =
            (implementation < self.implementation).then(|| self.implementation - implementation);
        let recurring_shortfall =
            (recurring < self.recurring).then(|| self.recurring - recurring);

        if implementation_shortfall.is_none() && recurring_shortfall.is_none() {
            return Ok(());
        }

        Err(FloorBreach { implementation_shortfall, recurring_shortfall })
    }
}

impl fmt::Display for FloorBreach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(shortfall) = self.implementation_shortfall {
            parts.push(format!("implementation is {shortfall} below the one-time tool cost"));
        }
        if let Some(shortfall) = self.recurring_shortfall {
            parts.push(format!("recurring is {shortfall} below the monthly tool cost"));
        }
        f.write_str(&parts.join("; "))
    }
}
