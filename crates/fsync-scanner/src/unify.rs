/// Normalizes, sorts, and deduplicates a list of scan subpaths, collapsing
/// any empty entry (or bare separator/".") to "the whole folder" and
/// dropping subpaths whose ancestor is already present in the list (§4.2
/// step 1, §8 property 6).
///
/// Idempotent: `unify_subs(unify_subs(xs)) == unify_subs(xs)`.
pub fn unify_subs(paths: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = paths
        .iter()
        .map(|p| p.trim_matches('/').replace('\\', "/"))
        .collect();

    if normalized.is_empty() || normalized.iter().any(|p| p.is_empty() || p == ".") {
        return vec!["".to_string()];
    }

    normalized.sort();
    normalized.dedup();

    let mut out: Vec<String> = Vec::new();
    'outer: for candidate in normalized {
        for existing in &out {
            if is_ancestor(existing, &candidate) {
                continue 'outer;
            }
        }
        out.retain(|existing: &String| !is_ancestor(&candidate, existing));
        out.push(candidate);
    }
    out.sort();
    out
}

fn is_ancestor(ancestor: &str, candidate: &str) -> bool {
    ancestor == candidate || candidate.starts_with(&format!("{ancestor}/"))
}
