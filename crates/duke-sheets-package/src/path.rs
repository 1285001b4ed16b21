//! Part-name arithmetic for relationship targets

/// Name of the relationships part that belongs to `part`.
///
/// `xl/worksheets/sheet1.xml` -> `xl/worksheets/_rels/sheet1.xml.rels`
pub fn rels_for_part(part: &str) -> String {
    let part = part.trim_start_matches('/');
    match part.rsplit_once('/') {
        Some((dir, file_name)) => format!("{dir}/_rels/{file_name}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolve a relationship target against the part that owns the relationship.
///
/// Relative targets are resolved from the source part's folder, absolute targets
/// from the package root. URI fragments are dropped.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    let target = target.split('#').next().unwrap_or(target);
    if target.is_empty() {
        return normalize(source_part);
    }
    if let Some(target) = target.strip_prefix('/') {
        return normalize(target);
    }

    let base_dir = source_part
        .trim_start_matches('/')
        .rsplit_once('/')
        .map(|(dir, _)| dir)
        .unwrap_or("");
    normalize(&format!("{base_dir}/{target}"))
}

/// Relative target that points from `source_part` to `target_part`.
///
/// `relative_target("xl/worksheets/sheet1.xml", "xl/slicers/slicer1.xml")`
/// is `../slicers/slicer1.xml`.
pub fn relative_target(source_part: &str, target_part: &str) -> String {
    let source = normalize(source_part);
    let target = normalize(target_part);

    let source_dir: Vec<&str> = match source.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    let target_segments: Vec<&str> = target.split('/').collect();
    let (target_dir, target_file) = target_segments.split_at(target_segments.len() - 1);

    let common = source_dir
        .iter()
        .zip(target_dir.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out: Vec<&str> = Vec::new();
    out.extend(std::iter::repeat("..").take(source_dir.len() - common));
    out.extend(&target_dir[common..]);
    out.extend(target_file);
    out.join("/")
}

fn normalize(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rels_for_part() {
        assert_eq!(rels_for_part("xl/workbook.xml"), "xl/_rels/workbook.xml.rels");
        assert_eq!(
            rels_for_part("xl/worksheets/sheet1.xml"),
            "xl/worksheets/_rels/sheet1.xml.rels"
        );
        assert_eq!(rels_for_part("workbook.xml"), "_rels/workbook.xml.rels");
    }

    #[test]
    fn test_resolve_relative_target() {
        assert_eq!(
            resolve_target("xl/worksheets/sheet1.xml", "../slicers/slicer1.xml"),
            "xl/slicers/slicer1.xml"
        );
        assert_eq!(
            resolve_target("xl/workbook.xml", "worksheets/sheet1.xml"),
            "xl/worksheets/sheet1.xml"
        );
    }

    #[test]
    fn test_resolve_absolute_target() {
        assert_eq!(
            resolve_target("xl/workbook.xml", "/xl/slicerCaches/slicerCache1.xml"),
            "xl/slicerCaches/slicerCache1.xml"
        );
    }

    #[test]
    fn test_resolve_strips_fragment() {
        assert_eq!(
            resolve_target("xl/workbook.xml", "worksheets/sheet1.xml#rId1"),
            "xl/worksheets/sheet1.xml"
        );
        assert_eq!(resolve_target("xl/workbook.xml", "#rId1"), "xl/workbook.xml");
    }

    #[test]
    fn test_relative_target() {
        assert_eq!(
            relative_target("xl/worksheets/sheet1.xml", "xl/drawings/drawing1.xml"),
            "../drawings/drawing1.xml"
        );
        assert_eq!(
            relative_target("xl/workbook.xml", "xl/slicerCaches/slicerCache2.xml"),
            "slicerCaches/slicerCache2.xml"
        );
        assert_eq!(relative_target("_rels/.rels", "xl/workbook.xml"), "../xl/workbook.xml");
    }

    #[test]
    fn test_relative_target_resolves_back() {
        let source = "xl/worksheets/sheet3.xml";
        let target = "xl/slicers/slicer7.xml";
        assert_eq!(resolve_target(source, &relative_target(source, target)), target);
    }
}
