//! Glob query traversal over the object tree
//!
//! At each step the traversal holds the current path and the remaining
//! pattern segments. It reads the current object's links, derives the direct
//! child paths, matches the percent-decoded head segment against the
//! percent-decoded child names and descends into the matches. Depth is
//! bounded by the pattern length, so link cycles cannot cause
//! non-termination.

use crate::error::{ServiceError, ServiceResult};
use crate::glob;
use crate::paths;
use crate::service::{QueryResult, Service};
use crate::types::{Link, SERVICE_MARKER};

/// Appends every object matching `pattern` to `results`, in traversal order.
/// Duplicate hits are possible when several links point at the same object;
/// they are intentionally not suppressed.
pub(crate) async fn collect_matches(
    service: &dyn Service,
    pattern: &str,
    results: &mut Vec<QueryResult>,
) -> ServiceResult<()> {
    let pattern = pattern.strip_prefix('/').unwrap_or(pattern);
    let segments: Vec<&str> = if pattern.is_empty() {
        Vec::new()
    } else {
        pattern.split('/').collect()
    };

    // depth-first walk; each entry is (object path, pattern segments consumed)
    let mut stack = vec![(String::from("/"), 0usize)];
    while let Some((path, depth)) = stack.pop() {
        let (attributes, links) = service.read_properties(&path).await?;
        let Some(raw_segment) = segments.get(depth) else {
            results.push(QueryResult {
                path,
                attributes,
                links,
            });
            continue;
        };
        let segment = paths::unescape_segment(raw_segment).map_err(|err| {
            bad_pattern(raw_segment, &err.to_string())
        })?;

        let mut matched = Vec::new();
        for child in child_paths(&path, &links) {
            let name = paths::base_name(&child);
            let ident = paths::unescape_segment(name).map_err(|err| {
                ServiceError::internal(format!("Invalid identifier '{name}' for object: {err}"))
            })?;
            let hit = glob::match_segment(&segment, &ident)
                .map_err(|err| bad_pattern(raw_segment, &err.to_string()))?;
            if hit {
                matched.push((child, depth + 1));
            }
        }
        // preserve link order under the LIFO stack
        for entry in matched.into_iter().rev() {
            stack.push(entry);
        }
    }
    Ok(())
}

fn bad_pattern(raw_segment: &str, reason: &str) -> ServiceError {
    ServiceError::bad_request(format!(
        "Invalid content '{raw_segment}' in URL parameter ~path for query service: {reason}"
    ))
}

/// Derives the direct child paths of an object from its links: resolves
/// relative targets against the object's path and keeps only targets whose
/// parent is the object itself. Service links are not children.
fn child_paths(obj_path: &str, links: &[Link]) -> Vec<String> {
    let mut children = Vec::new();
    for link in links {
        if link.role == SERVICE_MARKER {
            continue;
        }
        let target = if paths::is_abs(&link.target) {
            paths::clean(&link.target)
        } else {
            paths::join(obj_path, &link.target)
        };
        if paths::parent(&target) == obj_path {
            children.push(target);
        }
    }
    children
}
