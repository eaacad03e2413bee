use crate::photokepler_core::photo::PhotoRecord;

/// Check that a latitude/longitude pair is numeric and within range.
pub fn has_valid_location(latitude: Option<f64>, longitude: Option<f64>) -> bool {
    match (latitude, longitude) {
        (Some(lat), Some(lon)) => {
            // Range checks are false for NaN, which excludes it as well
            (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
        }
        _ => false,
    }
}

/// A record can be exported once it has a capture date and a usable location.
pub fn is_exportable(record: &PhotoRecord) -> bool {
    record.date.is_some() && has_valid_location(record.latitude, record.longitude)
}

/// Keep exportable records and order them by capture date.
///
/// The sort is stable, so records with identical dates stay in library order.
pub fn select_for_export(records: Vec<PhotoRecord>) -> Vec<PhotoRecord> {
    let total = records.len();
    let mut selected: Vec<PhotoRecord> = records.into_iter().filter(is_exportable).collect();
    selected.sort_by_key(|record| record.date);

    log::info!(
        "Selected {} of {} photos with a date and location",
        selected.len(),
        total
    );
    selected
}
