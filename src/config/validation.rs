use super::schema::Settings;

/// Validate settings at startup.
/// Returns all validation errors at once (not just the first).
pub fn validate_settings(settings: &Settings) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    match settings.ranking.deadline() {
        Ok(d) if d.is_zero() => {
            errors.push("ranking.deadline: must be greater than zero".to_string());
        }
        Ok(_) => {}
        Err(e) => errors.push(format!(
            "ranking.deadline: invalid duration '{}' - {}",
            settings.ranking.deadline, e
        )),
    }

    if settings.ranking.key_prefix.trim().is_empty() {
        errors.push("ranking.key_prefix: must not be empty".to_string());
    }

    if settings.ranking.default_limit == 0 {
        errors.push("ranking.default_limit: must be greater than zero".to_string());
    }

    let max = settings.scoring.max_minutes_per_event;
    if !(1..=1440).contains(&max) {
        errors.push(format!(
            "scoring.max_minutes_per_event: {} is outside 1..=1440",
            max
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
