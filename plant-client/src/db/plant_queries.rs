use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::domain::{GenerationTotals, PlantRecord, StateCode};

/// DDL for the `plants` table and its lookup indexes.
pub const SCHEMA_SQL: &str = include_str!("../../sql/schema/01_plants.sql");

/// Bind parameters each plant adds to an upsert statement.
pub const BINDS_PER_PLANT: usize = 6;

/// Largest batch a single multi-row upsert can carry; Postgres caps a
/// statement at 65535 bind parameters.
pub const MAX_UPSERT_BATCH: usize = u16::MAX as usize / BINDS_PER_PLANT;

/// Effect of one upsert on the stored set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// The key existed and every attribute already matched.
    Unchanged,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertCounts {
    pub inserted: u64,
    pub updated: u64,
    pub unchanged: u64,
}

impl UpsertCounts {
    pub fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.inserted + self.updated + self.unchanged
    }
}

/// Apply the schema. Every statement is idempotent.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await.map(|_| ())
}

// Rows whose attributes are identical are filtered by the WHERE clause and
// therefore produce no RETURNING row; `xmax = 0` marks freshly inserted rows.
const UPSERT_TAIL: &str = r#"
    ON CONFLICT (facility_id) DO UPDATE SET
        name = EXCLUDED.name,
        state = EXCLUDED.state,
        latitude = EXCLUDED.latitude,
        longitude = EXCLUDED.longitude,
        annual_net_generation = EXCLUDED.annual_net_generation,
        updated_at = now()
    WHERE (plants.name, plants.state, plants.latitude, plants.longitude, plants.annual_net_generation)
        IS DISTINCT FROM
          (EXCLUDED.name, EXCLUDED.state, EXCLUDED.latitude, EXCLUDED.longitude, EXCLUDED.annual_net_generation)
    RETURNING (xmax = 0) AS inserted
"#;

fn upsert_builder<'a>(plants: &'a [PlantRecord]) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO plants (facility_id, name, state, latitude, longitude, annual_net_generation) ",
    );

    builder.push_values(plants, |mut b, p| {
        b.push_bind(p.facility_id)
            .push_bind(&p.name)
            .push_bind(&p.state)
            .push_bind(p.latitude)
            .push_bind(p.longitude)
            .push_bind(p.annual_net_generation);
    });
    builder.push(UPSERT_TAIL);
    builder
}

/// Upsert a set of plants in a single statement.
///
/// The statement is atomic: either every row applies or none does. Keys must
/// be unique within `plants`, Postgres refuses to touch the same row twice
/// in one `ON CONFLICT` statement.
pub async fn upsert_plants(pool: &PgPool, plants: &[PlantRecord]) -> Result<UpsertCounts, sqlx::Error> {
    if plants.is_empty() {
        return Ok(UpsertCounts::default());
    }

    let mut builder = upsert_builder(plants);
    let flags: Vec<bool> = builder
        .build_query_scalar::<bool>()
        .fetch_all(pool)
        .await?;

    let inserted = flags.iter().filter(|f| **f).count() as u64;
    let updated = flags.len() as u64 - inserted;
    Ok(UpsertCounts {
        inserted,
        updated,
        unchanged: plants.len() as u64 - inserted - updated,
    })
}

/// Upsert a single plant.
pub async fn upsert_plant(pool: &PgPool, plant: &PlantRecord) -> Result<UpsertOutcome, sqlx::Error> {
    let mut builder = upsert_builder(std::slice::from_ref(plant));
    let flag: Option<bool> = builder
        .build_query_scalar::<bool>()
        .fetch_optional(pool)
        .await?;

    Ok(match flag {
        Some(true) => UpsertOutcome::Inserted,
        Some(false) => UpsertOutcome::Updated,
        None => UpsertOutcome::Unchanged,
    })
}

/// Plants ordered by annual net generation (largest first), optionally
/// restricted to one state.
pub async fn find_top(
    pool: &PgPool,
    limit: u32,
    state: Option<&StateCode>,
) -> Result<Vec<PlantRecord>, sqlx::Error> {
    sqlx::query_as::<_, PlantRecord>(
        r#"
        SELECT
            facility_id,
            name,
            state,
            latitude,
            longitude,
            annual_net_generation
        FROM plants
        WHERE ($1::text IS NULL OR state = $1)
        ORDER BY annual_net_generation DESC, facility_id ASC
        LIMIT $2
        "#,
    )
    .bind(state.map(StateCode::as_str))
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await
}

/// Sum and count of annual net generation over the same filter as
/// [`find_top`]. An empty match yields zeros.
pub async fn aggregate_total(
    pool: &PgPool,
    state: Option<&StateCode>,
) -> Result<GenerationTotals, sqlx::Error> {
    let (total, count): (f64, i64) = sqlx::query_as(
        r#"
        SELECT
            COALESCE(SUM(annual_net_generation), 0)::float8 AS total,
            COUNT(*)                                        AS count
        FROM plants
        WHERE ($1::text IS NULL OR state = $1)
        "#,
    )
    .bind(state.map(StateCode::as_str))
    .fetch_one(pool)
    .await?;

    Ok(GenerationTotals {
        total,
        count: count.max(0) as u64,
    })
}
