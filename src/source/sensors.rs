//! Home Assistant entity-state adapter

use futures::future::{try_join_all, BoxFuture};
use serde::Deserialize;

use super::home_assistant::HomeAssistant;
use super::{DataSource, FetchContext, SourceFailure, SourceResult, SourceValue};

/// Latest state of one entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorReading {
    pub entity_id: String,
    pub name: String,
    pub state: String,
    pub unit: Option<String>,
}

impl SensorReading {
    /// State with its unit, e.g. `21.5 °C`
    pub fn display_value(&self) -> String {
        match &self.unit {
            Some(unit) if !unit.is_empty() => format!("{} {}", self.state, unit),
            _ => self.state.clone(),
        }
    }
}

/// Readings in configured order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sensors {
    pub readings: Vec<SensorReading>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAttributes {
    friendly_name: Option<String>,
    unit_of_measurement: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawState {
    entity_id: String,
    state: String,
    #[serde(default)]
    attributes: RawAttributes,
}

impl From<RawState> for SensorReading {
    fn from(raw: RawState) -> Self {
        SensorReading {
            name: raw
                .attributes
                .friendly_name
                .unwrap_or_else(|| raw.entity_id.clone()),
            entity_id: raw.entity_id,
            state: raw.state,
            unit: raw.attributes.unit_of_measurement,
        }
    }
}

/// Parse a `/api/states/<entity_id>` body.
pub fn parse_state(body: &str) -> std::result::Result<SensorReading, SourceFailure> {
    serde_json::from_str::<RawState>(body)
        .map(SensorReading::from)
        .map_err(|e| SourceFailure::parse(e.to_string()))
}

/// Fetches the current state of a list of entities
pub struct SensorSource {
    api: HomeAssistant,
    entities: Vec<String>,
}

impl SensorSource {
    pub fn new(api: HomeAssistant, entities: Vec<String>) -> Self {
        Self { api, entities }
    }

    async fn fetch_entity(
        &self,
        entity_id: &str,
        ctx: &FetchContext,
    ) -> std::result::Result<SensorReading, SourceFailure> {
        let path = format!("states/{}", entity_id);
        let raw: RawState = self.api.get_json(&path, &[], ctx.remaining()).await?;
        Ok(raw.into())
    }
}

impl DataSource for SensorSource {
    fn name(&self) -> &str {
        "sensors"
    }

    fn fetch<'a>(&'a self, ctx: &'a FetchContext) -> BoxFuture<'a, SourceResult> {
        Box::pin(async move {
            let all = try_join_all(self.entities.iter().map(|id| self.fetch_entity(id, ctx)));
            let sensors = ctx
                .run(all)
                .await
                .map(|readings| SourceValue::Sensors(Sensors { readings }));
            SourceResult::from(sensors)
        })
    }
}
