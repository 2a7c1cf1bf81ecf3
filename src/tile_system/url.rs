use crate::projection::{CellKey, DoubleRect};
use crate::tile_system::types::TileError;

/// Tile URL with `{z}`, `{x}`, `{y}` or `{quadkey}` placeholders.
///
/// Placeholder names are matched case-insensitively; unknown ones are kept
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileUrlTemplate {
    template: String,
}

enum Segment<'a> {
    Text(&'a str),
    Placeholder(&'a str),
}

fn segments(template: &str) -> Result<Vec<Segment<'_>>, TileError> {
    let mut result = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let end = rest[start..]
            .find('}')
            .map(|offset| start + offset)
            .ok_or_else(|| TileError::InvalidTemplate(format!("unclosed placeholder in {template}")))?;
        if start > 0 {
            result.push(Segment::Text(&rest[..start]));
        }
        result.push(Segment::Placeholder(&rest[start + 1..end]));
        rest = &rest[end + 1..];
    }
    if !rest.is_empty() {
        result.push(Segment::Text(rest));
    }
    Ok(result)
}

impl TileUrlTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self, TileError> {
        let template = template.into();
        let names: Vec<String> = segments(&template)?
            .into_iter()
            .filter_map(|segment| match segment {
                Segment::Placeholder(name) => Some(name.to_ascii_lowercase()),
                Segment::Text(_) => None,
            })
            .collect();

        let has = |name: &str| names.iter().any(|n| n == name);
        if !(has("quadkey") || (has("z") && has("x") && has("y"))) {
            return Err(TileError::InvalidTemplate(format!(
                "{template} needs {{z}}, {{x}} and {{y}} or {{quadkey}}"
            )));
        }
        Ok(Self { template })
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Fills the placeholders for `cell`
    pub fn format(&self, cell: CellKey, map_rect: &DoubleRect) -> String {
        let (x, y) = tile_coordinates(cell, map_rect);
        let mut url = String::with_capacity(self.template.len() + 16);
        // Validated in `new`
        for segment in segments(&self.template).unwrap_or_default() {
            match segment {
                Segment::Text(text) => url.push_str(text),
                Segment::Placeholder(name) => match name.to_ascii_lowercase().as_str() {
                    "z" => url.push_str(&cell.zoom.to_string()),
                    "x" => url.push_str(&x.to_string()),
                    "y" => url.push_str(&y.to_string()),
                    "quadkey" => url.push_str(&cell.to_string()),
                    _ => {
                        url.push('{');
                        url.push_str(name);
                        url.push('}');
                    }
                },
            }
        }
        url
    }
}

/// Column and row of the cell's origin in the zoom level's tile grid
pub fn tile_coordinates(cell: CellKey, map_rect: &DoubleRect) -> (u32, u32) {
    let rect = cell.compute_rect(map_rect);
    let grid = CellKey::grid_size(cell.zoom) as f64;
    let x = (rect.left() - map_rect.left()) / map_rect.width() * grid;
    let y = (rect.top() - map_rect.top()) / map_rect.height() * grid;
    (x.round() as u32, y.round() as u32)
}

/// Round-robin over several hosts serving the same tiles
#[derive(Debug, Clone)]
pub struct DomainRotation {
    templates: Vec<TileUrlTemplate>,
    next: usize,
}

impl DomainRotation {
    pub fn new(domains: &[String]) -> Result<Self, TileError> {
        if domains.is_empty() {
            return Err(TileError::InvalidTemplate("no domains configured".to_string()));
        }
        let templates = domains
            .iter()
            .map(|domain| TileUrlTemplate::new(domain.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { templates, next: 0 })
    }

    pub fn next_url(&mut self, cell: CellKey, map_rect: &DoubleRect) -> String {
        let template = &self.templates[self.next];
        self.next = (self.next + 1) % self.templates.len();
        template.format(cell, map_rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::math::DVec2;

    fn map_rect() -> DoubleRect {
        DoubleRect::new(DVec2::ZERO, DVec2::splat(256.0))
    }

    #[test]
    fn test_placeholders_are_case_insensitive() {
        let template = TileUrlTemplate::new("https://t/{Z}/{x}/{Y}.png?key={token}").unwrap();
        let cell: CellKey = "132".parse().unwrap();
        assert_eq!(
            template.format(cell, &map_rect()),
            "https://t/3/6/3.png?key={token}"
        );
    }

    #[test]
    fn test_quadkey_template() {
        let template = TileUrlTemplate::new("https://t/{quadkey}.mvt").unwrap();
        assert_eq!(template.format("0213".parse().unwrap(), &map_rect()), "https://t/0213.mvt");
    }

    #[test]
    fn test_invalid_templates() {
        assert!(TileUrlTemplate::new("https://t/{z}/{x}.png").is_err());
        assert!(TileUrlTemplate::new("https://t/{z}/{x}/{y").is_err());
    }

    #[test]
    fn test_domains_rotate() {
        let mut rotation = DomainRotation::new(&[
            "https://a/{z}/{x}/{y}".to_string(),
            "https://b/{z}/{x}/{y}".to_string(),
        ])
        .unwrap();
        let urls: Vec<String> = (0..3)
            .map(|_| rotation.next_url(CellKey::ROOT, &map_rect()))
            .collect();
        assert_eq!(urls, vec!["https://a/0/0/0", "https://b/0/0/0", "https://a/0/0/0"]);
    }
}
