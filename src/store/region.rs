// Region rows
//
// A region's stored priority uses the regional formula (deforestation as the
// environmental signal, corruption as a subtracted penalty), distinct from
// the submission-scoring engine.

use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{constraint_to_validation, now_rfc3339, Store};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize)]
pub struct Region {
    pub id: i64,
    pub region_id: String,
    pub name: String,
    pub county: String,
    pub population: i64,
    pub area_sq_km: f64,
    pub poverty_index: f64,
    pub unemployment_rate: f64,
    pub education_index: f64,
    pub health_index: f64,
    pub deforestation_rate: f64,
    pub air_quality_index: f64,
    pub water_scarcity: f64,
    pub project_impact_score: f64,
    pub infrastructure_need: f64,
    pub corruption_risk: f64,
    pub priority_score: f64,
    pub current_allocation: f64,
    pub created_at: String,
    pub updated_at: String,
    pub last_assessment: Option<String>,
}

/// Create/update payload. Indicator defaults mirror the column defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRegion {
    pub region_id: String,
    pub name: String,
    #[serde(default)]
    pub county: String,
    #[serde(default)]
    pub population: i64,
    #[serde(default)]
    pub area_sq_km: f64,
    #[serde(default = "half")]
    pub poverty_index: f64,
    #[serde(default = "half")]
    pub unemployment_rate: f64,
    #[serde(default = "half")]
    pub education_index: f64,
    #[serde(default = "half")]
    pub health_index: f64,
    #[serde(default = "half")]
    pub deforestation_rate: f64,
    #[serde(default = "half")]
    pub air_quality_index: f64,
    #[serde(default = "half")]
    pub water_scarcity: f64,
    #[serde(default = "half")]
    pub project_impact_score: f64,
    #[serde(default = "half")]
    pub infrastructure_need: f64,
    #[serde(default = "low_risk")]
    pub corruption_risk: f64,
}

fn half() -> f64 {
    0.5
}
fn low_risk() -> f64 {
    0.3
}

impl NewRegion {
    pub fn validate(&self) -> Result<()> {
        if self.region_id.trim().is_empty() {
            return Err(Error::validation("region_id is required"));
        }
        if self.name.trim().is_empty() {
            return Err(Error::validation("name is required"));
        }
        if self.population < 0 {
            return Err(Error::validation("population must be non-negative"));
        }
        if self.area_sq_km < 0.0 {
            return Err(Error::validation("area_sq_km must be non-negative"));
        }
        for (name, value) in [
            ("poverty_index", self.poverty_index),
            ("unemployment_rate", self.unemployment_rate),
            ("education_index", self.education_index),
            ("health_index", self.health_index),
            ("deforestation_rate", self.deforestation_rate),
            ("air_quality_index", self.air_quality_index),
            ("water_scarcity", self.water_scarcity),
            ("project_impact_score", self.project_impact_score),
            ("infrastructure_need", self.infrastructure_need),
            ("corruption_risk", self.corruption_risk),
        ] {
            if !(0.0..=1.0).contains(&value) || !value.is_finite() {
                return Err(Error::validation(format!(
                    "{name} must be between 0 and 1, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Regional priority formula: 0.40 poverty + 0.30 impact + 0.20 deforestation
/// - 0.10 corruption.
pub(super) fn regional_priority(
    poverty: f64,
    impact: f64,
    deforestation: f64,
    corruption: f64,
) -> f64 {
    poverty * 0.40 + impact * 0.30 + deforestation * 0.20 - corruption * 0.10
}

const REGION_COLUMNS: &str = "id, region_id, name, county, population, area_sq_km, \
     poverty_index, unemployment_rate, education_index, health_index, \
     deforestation_rate, air_quality_index, water_scarcity, \
     project_impact_score, infrastructure_need, corruption_risk, \
     priority_score, current_allocation, created_at, updated_at, last_assessment";

fn region_from_row(row: &Row) -> rusqlite::Result<Region> {
    Ok(Region {
        id: row.get(0)?,
        region_id: row.get(1)?,
        name: row.get(2)?,
        county: row.get(3)?,
        population: row.get(4)?,
        area_sq_km: row.get(5)?,
        poverty_index: row.get(6)?,
        unemployment_rate: row.get(7)?,
        education_index: row.get(8)?,
        health_index: row.get(9)?,
        deforestation_rate: row.get(10)?,
        air_quality_index: row.get(11)?,
        water_scarcity: row.get(12)?,
        project_impact_score: row.get(13)?,
        infrastructure_need: row.get(14)?,
        corruption_risk: row.get(15)?,
        priority_score: row.get(16)?,
        current_allocation: row.get(17)?,
        created_at: row.get(18)?,
        updated_at: row.get(19)?,
        last_assessment: row.get(20)?,
    })
}

impl Store {
    pub async fn create_region(&self, new: &NewRegion) -> Result<Region> {
        new.validate()?;
        let now = now_rfc3339();
        let priority = regional_priority(
            new.poverty_index,
            new.project_impact_score,
            new.deforestation_rate,
            new.corruption_risk,
        );

        let conn = self.lock().await;
        conn.execute(
            "INSERT INTO regions (region_id, name, county, population, area_sq_km, \
             poverty_index, unemployment_rate, education_index, health_index, \
             deforestation_rate, air_quality_index, water_scarcity, \
             project_impact_score, infrastructure_need, corruption_risk, \
             priority_score, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                new.region_id,
                new.name,
                new.county,
                new.population,
                new.area_sq_km,
                new.poverty_index,
                new.unemployment_rate,
                new.education_index,
                new.health_index,
                new.deforestation_rate,
                new.air_quality_index,
                new.water_scarcity,
                new.project_impact_score,
                new.infrastructure_need,
                new.corruption_risk,
                priority,
                now,
                now,
            ],
        )
        .map_err(|e| {
            constraint_to_validation(e, &format!("region_id already exists: {}", new.region_id))
        })?;

        let region = conn
            .query_row(
                &format!("SELECT {REGION_COLUMNS} FROM regions WHERE region_id = ?1"),
                params![new.region_id],
                region_from_row,
            )?;
        Ok(region)
    }

    pub async fn list_regions(&self) -> Result<Vec<Region>> {
        let conn = self.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REGION_COLUMNS} FROM regions ORDER BY priority_score DESC, name ASC"
        ))?;
        let regions = stmt
            .query_map([], region_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(regions)
    }

    pub async fn get_region(&self, region_id: &str) -> Result<Region> {
        let conn = self.lock().await;
        conn.query_row(
            &format!("SELECT {REGION_COLUMNS} FROM regions WHERE region_id = ?1"),
            params![region_id],
            region_from_row,
        )
        .optional()?
        .ok_or_else(|| Error::not_found("region", region_id))
    }

    pub async fn update_region(&self, region_id: &str, new: &NewRegion) -> Result<Region> {
        new.validate()?;
        let now = now_rfc3339();

        let changed = {
            let conn = self.lock().await;
            conn.execute(
                "UPDATE regions SET name = ?1, county = ?2, population = ?3, area_sq_km = ?4, \
                 poverty_index = ?5, unemployment_rate = ?6, education_index = ?7, \
                 health_index = ?8, deforestation_rate = ?9, air_quality_index = ?10, \
                 water_scarcity = ?11, project_impact_score = ?12, infrastructure_need = ?13, \
                 corruption_risk = ?14, updated_at = ?15 WHERE region_id = ?16",
                params![
                    new.name,
                    new.county,
                    new.population,
                    new.area_sq_km,
                    new.poverty_index,
                    new.unemployment_rate,
                    new.education_index,
                    new.health_index,
                    new.deforestation_rate,
                    new.air_quality_index,
                    new.water_scarcity,
                    new.project_impact_score,
                    new.infrastructure_need,
                    new.corruption_risk,
                    now,
                    region_id,
                ],
            )?
        };

        if changed == 0 {
            return Err(Error::not_found("region", region_id));
        }
        self.get_region(region_id).await
    }

    pub async fn delete_region(&self, region_id: &str) -> Result<()> {
        let conn = self.lock().await;
        let changed = conn.execute(
            "DELETE FROM regions WHERE region_id = ?1",
            params![region_id],
        )?;
        if changed == 0 {
            return Err(Error::not_found("region", region_id));
        }
        Ok(())
    }

    /// Recompute and persist the regional priority. Returns the new score.
    pub async fn recalc_region_priority(&self, region_id: &str) -> Result<Region> {
        let region = self.get_region(region_id).await?;
        let priority = regional_priority(
            region.poverty_index,
            region.project_impact_score,
            region.deforestation_rate,
            region.corruption_risk,
        );
        let now = now_rfc3339();

        {
            let conn = self.lock().await;
            conn.execute(
                "UPDATE regions SET priority_score = ?1, last_assessment = ?2, updated_at = ?2 \
                 WHERE region_id = ?3",
                params![priority, now, region_id],
            )?;
        }
        self.get_region(region_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regional_priority_formula() {
        // 0.8*0.4 + 0.9*0.3 + 0.4*0.2 - 0.3*0.1 = 0.32+0.27+0.08-0.03 = 0.64
        let score = regional_priority(0.8, 0.9, 0.4, 0.3);
        assert!((score - 0.64).abs() < 1e-9);
    }

    #[test]
    fn test_new_region_validation() {
        let mut region = NewRegion {
            region_id: "R-1".to_string(),
            name: "North".to_string(),
            county: String::new(),
            population: 1000,
            area_sq_km: 50.0,
            poverty_index: 0.5,
            unemployment_rate: 0.5,
            education_index: 0.5,
            health_index: 0.5,
            deforestation_rate: 0.5,
            air_quality_index: 0.5,
            water_scarcity: 0.5,
            project_impact_score: 0.5,
            infrastructure_need: 0.5,
            corruption_risk: 0.3,
        };
        assert!(region.validate().is_ok());

        region.poverty_index = 1.5;
        assert!(region.validate().is_err());

        region.poverty_index = 0.5;
        region.region_id = "  ".to_string();
        assert!(region.validate().is_err());
    }
}
