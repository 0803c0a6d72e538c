//! `[imagemap]` bodies: an image URL line followed by one region per line,
//! `X Y W H link title`, all coordinates in percent of the image.

use itertools::Itertools;

use crate::bbcode::tags;

#[derive(Debug, Clone, PartialEq)]
pub struct ImageMap {
    pub image_url: String,
    pub regions: Vec<ImageMapRegion>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageMapRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// `None` for `#`: the region only shows its title.
    pub link: Option<String>,
    pub title: String,
}

impl ImageMapRegion {
    pub fn is_interactive(&self) -> bool {
        self.link.is_some()
    }

    /// Inline style positioning the region over the image.
    pub fn style(&self) -> String {
        format!(
            "left:{}%;top:{}%;width:{}%;height:{}%;",
            self.x, self.y, self.width, self.height
        )
    }
}

fn percent(token: &str) -> Option<f64> {
    token
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && (0.0..=100.0).contains(v))
}

fn parse_region(line: &str) -> Result<ImageMapRegion, String> {
    let mut parts = line.split_whitespace();
    let mut coords = [0.0; 4];
    for slot in &mut coords {
        let token = parts
            .next()
            .ok_or_else(|| format!("region \"{line}\" needs X Y W H link"))?;
        *slot = percent(token)
            .ok_or_else(|| format!("\"{token}\" is not a percentage between 0 and 100"))?;
    }
    let link = parts
        .next()
        .ok_or_else(|| format!("region \"{line}\" has no link"))?;
    let link = if link == "#" {
        None
    } else {
        Some(tags::sanitize_url(link).ok_or_else(|| format!("invalid link \"{link}\""))?)
    };
    let title = parts.join(" ");
    let [x, y, width, height] = coords;
    Ok(ImageMapRegion {
        x,
        y,
        width,
        height,
        link,
        title,
    })
}

/// Parse an imagemap body. Bad region lines are reported and skipped; a
/// missing or invalid image line yields no map at all.
pub fn parse_imagemap(body: &str) -> (Option<ImageMap>, Vec<String>) {
    let mut lines = body.lines().map(str::trim).filter(|l| !l.is_empty());
    let Some(first) = lines.next() else {
        return (None, vec!["missing image url".to_string()]);
    };
    let Some(image_url) = tags::sanitize_url(first) else {
        return (None, vec![format!("invalid image url \"{first}\"")]);
    };

    let mut regions = Vec::new();
    let mut errors = Vec::new();
    for line in lines {
        match parse_region(line) {
            Ok(region) => regions.push(region),
            Err(reason) => errors.push(reason),
        }
    }
    (Some(ImageMap { image_url, regions }), errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_linked_region() {
        let (map, errors) = parse_imagemap(
            "\nhttps://example.com/map.png\n10.0 10.0 30.0 20.0 https://example.com Title\n",
        );
        assert!(errors.is_empty());
        let map = map.unwrap();
        assert_eq!(map.image_url, "https://example.com/map.png");
        assert_eq!(map.regions.len(), 1);
        let region = &map.regions[0];
        assert_eq!((region.x, region.y, region.width, region.height), (10.0, 10.0, 30.0, 20.0));
        assert_eq!(region.link.as_deref(), Some("https://example.com"));
        assert_eq!(region.title, "Title");
        assert_eq!(region.style(), "left:10%;top:10%;width:30%;height:20%;");
    }

    #[test]
    fn hash_link_is_informational() {
        let (map, errors) = parse_imagemap("/img.png\n0 0 50 50 # just a label here");
        assert!(errors.is_empty());
        let region = &map.unwrap().regions[0];
        assert!(!region.is_interactive());
        assert_eq!(region.title, "just a label here");
    }

    #[test]
    fn bad_lines_reported_one_each() {
        let (map, errors) = parse_imagemap(
            "https://example.com/a.png\n1 2 3\n1 2 3 400 # too big\n5 5 5 5 javascript:x t\n5 5 5 5 /ok",
        );
        assert_eq!(errors.len(), 3);
        assert_eq!(map.unwrap().regions.len(), 1);
    }

    #[test]
    fn missing_image() {
        let (map, errors) = parse_imagemap("   \n");
        assert!(map.is_none());
        assert_eq!(errors, vec!["missing image url".to_string()]);
    }
}
