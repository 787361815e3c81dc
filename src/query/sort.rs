use crate::error::{Result, SkilletError};
use crate::schema::SchemaResolver;
use crate::types::{Entity, FieldType, RequestContext, SortSpec};
use serde_json::{json, Value};

/// Compile ordering entries into the DSL sort array.
///
/// Returns `Ok(None)` when there is nothing to sort by: an empty list, or a
/// list holding a single [`SortSpec::Unsorted`] entry (the caller's way of
/// saying "explicitly no ordering" rather than leaving ordering omitted).
pub fn parse_order(
    resolver: &SchemaResolver,
    entity: &dyn Entity,
    order: &[SortSpec],
    context: &RequestContext,
) -> Result<Option<Vec<Value>>> {
    if order.is_empty() {
        return Ok(None);
    }
    if let [SortSpec::Unsorted] = order {
        return Ok(None);
    }

    let mut clauses = Vec::new();
    for spec in order {
        match spec {
            SortSpec::Unsorted => continue,
            SortSpec::Script(script) => clauses.push(json!({ "_script": script })),
            SortSpec::Field { field, direction } => {
                let qualified = if field.contains('.') {
                    field.clone()
                } else {
                    format!("{}.{}", entity.namespace(), field)
                };

                match resolver.type_of(entity, &qualified) {
                    Some(FieldType::GeoPoint) => {
                        let (lat, lon) = context.point().ok_or_else(|| {
                            SkilletError::InvalidCondition(format!(
                                "geo-distance sort on '{qualified}' requires latitude and longitude"
                            ))
                        })?;
                        clauses.push(json!({
                            "_geo_distance": {
                                qualified: { "lat": lat, "lon": lon },
                                "order": direction.as_str(),
                                "distance_type": "plane"
                            }
                        }));
                    }
                    _ => clauses.push(json!({ qualified: { "order": direction.as_str() } })),
                }
            }
        }
    }

    Ok(if clauses.is_empty() {
        None
    } else {
        Some(clauses)
    })
}
