use axum::{Json, extract::State, response::IntoResponse};

use fushub_types::api::StatsResponse;
use fushub_types::models::Role;

use crate::error::ApiResult;
use crate::{AppState, db_call};

/// GET /stats: landing page counters.
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let (students, properties, cities) = db_call(&state, |db| {
        Ok((
            db.count_profiles_with_role(Role::Tenant)?,
            db.count_available_listings()?,
            db.count_distinct_cities()?,
        ))
    })
    .await?;

    let (students, properties, cities) = (
        students.max(0) as u64,
        properties.max(0) as u64,
        cities.max(0) as u64,
    );
    Ok(Json(StatsResponse {
        students,
        properties,
        cities,
        students_label: format_count(students),
        properties_label: format_count(properties),
        cities_label: format_count(cities),
    }))
}

/// Compact display form: `12+`, `3k+`, `2.5M+`. Thousands round down.
pub fn format_count(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M+", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{}k+", n / 1_000)
    } else {
        format!("{}+", n)
    }
}
