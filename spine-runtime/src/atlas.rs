use crate::Error;
use std::str::FromStr;

/// A parsed `.atlas` text file: texture pages and the packed regions on them.
#[derive(Clone, Debug, Default)]
pub struct Atlas {
    pub pages: Vec<AtlasPage>,
    pub regions: Vec<AtlasRegion>,
}

impl Atlas {
    pub fn parse(input: &str) -> Result<Self, Error> {
        parse_atlas(input)
    }

    /// First region with `name`, in file order.
    pub fn find_region(&self, name: &str) -> Option<&AtlasRegion> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// Region `name` carrying the sequence frame `index` (`index: N` entry).
    pub fn find_region_with_index(&self, name: &str, index: i32) -> Option<&AtlasRegion> {
        self.regions
            .iter()
            .find(|r| r.name == name && r.index == index)
    }

    pub fn page(&self, index: usize) -> Option<&AtlasPage> {
        self.pages.get(index)
    }

    /// Texture coordinates of `region`, ready to be stored on an attachment.
    pub fn texture_region(&self, region: &AtlasRegion) -> TextureRegion {
        let (page_width, page_height) = self
            .pages
            .get(region.page)
            .map(|p| (p.width as f32, p.height as f32))
            .unwrap_or((0.0, 0.0));
        TextureRegion {
            page: region.page,
            page_width,
            page_height,
            u: region.u,
            v: region.v,
            u2: region.u2,
            v2: region.v2,
            degrees: region.degrees,
            offset_x: region.offset_x as f32,
            offset_y: region.offset_y as f32,
            width: region.width as f32,
            height: region.height as f32,
            original_width: region.original_width as f32,
            original_height: region.original_height as f32,
        }
    }
}

impl FromStr for Atlas {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_atlas(s)
    }
}

#[derive(Clone, Debug)]
pub struct AtlasPage {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub scale: f32,
    pub format: Option<String>,
    pub pma: bool,
    pub min_filter: AtlasFilter,
    pub mag_filter: AtlasFilter,
    pub wrap_u: AtlasWrap,
    pub wrap_v: AtlasWrap,
}

impl AtlasPage {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            width: 0,
            height: 0,
            scale: 1.0,
            format: None,
            pma: false,
            min_filter: AtlasFilter::default(),
            mag_filter: AtlasFilter::default(),
            wrap_u: AtlasWrap::default(),
            wrap_v: AtlasWrap::default(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub enum AtlasFilter {
    #[default]
    Nearest,
    Linear,
    MipMap,
    MipMapNearestNearest,
    MipMapLinearNearest,
    MipMapNearestLinear,
    MipMapLinearLinear,
    Other(String),
}

impl AtlasFilter {
    fn from_name(value: &str) -> Self {
        match value {
            "Nearest" => Self::Nearest,
            "Linear" => Self::Linear,
            "MipMap" => Self::MipMap,
            "MipMapNearestNearest" => Self::MipMapNearestNearest,
            "MipMapLinearNearest" => Self::MipMapLinearNearest,
            "MipMapNearestLinear" => Self::MipMapNearestLinear,
            "MipMapLinearLinear" => Self::MipMapLinearLinear,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum AtlasWrap {
    #[default]
    ClampToEdge,
    Repeat,
}

#[derive(Clone, Debug)]
pub struct AtlasRegion {
    pub name: String,
    pub page: usize,
    pub index: i32,
    pub degrees: i32,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub offset_x: i32,
    pub offset_y: i32,
    pub original_width: i32,
    pub original_height: i32,
    pub u: f32,
    pub v: f32,
    pub u2: f32,
    pub v2: f32,
    /// Entries the format does not define (`split`, `pad`, custom keys) with their int values.
    pub names: Vec<String>,
    pub values: Vec<Vec<i32>>,
}

impl AtlasRegion {
    fn new(name: &str, page: usize) -> Self {
        Self {
            name: name.to_string(),
            page,
            index: -1,
            degrees: 0,
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            offset_x: 0,
            offset_y: 0,
            original_width: 0,
            original_height: 0,
            u: 0.0,
            v: 0.0,
            u2: 0.0,
            v2: 0.0,
            names: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Values of a non-standard entry such as `split` or `pad`.
    pub fn values_for(&self, name: &str) -> Option<&[i32]> {
        let i = self.names.iter().position(|n| n == name)?;
        self.values.get(i).map(Vec::as_slice)
    }
}

/// The subset of an atlas region that attachments keep after loading.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextureRegion {
    pub page: usize,
    pub page_width: f32,
    pub page_height: f32,
    pub u: f32,
    pub v: f32,
    pub u2: f32,
    pub v2: f32,
    pub degrees: i32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub width: f32,
    pub height: f32,
    pub original_width: f32,
    pub original_height: f32,
}

/// `key: a, b, c, d` split into the key and up to four values.
struct Entry<'a> {
    key: &'a str,
    values: Vec<&'a str>,
}

fn read_entry(line: &str) -> Option<Entry<'_>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (key, rest) = line.split_once(':')?;
    let mut values: Vec<&str> = rest.splitn(4, ',').map(str::trim).collect();
    if values.len() == 4 {
        // The fourth slot swallows any trailing commas; keep only the value itself.
        if let Some((head, _)) = values[3].split_once(',') {
            values[3] = head.trim();
        }
    }
    Some(Entry {
        key: key.trim(),
        values,
    })
}

fn parse_int(entry: &Entry<'_>, i: usize, line: usize) -> Result<i32, Error> {
    let raw = entry.values.get(i).copied().unwrap_or("");
    raw.parse::<i32>().map_err(|_| Error::AtlasParse {
        line,
        message: format!("invalid integer '{raw}' for '{}'", entry.key),
    })
}

fn parse_atlas(input: &str) -> Result<Atlas, Error> {
    let lines: Vec<&str> = input.lines().collect();
    let mut i = 0usize;

    // Skip blank lines, then a header block of `key: value` lines without a page name.
    while i < lines.len() && lines[i].trim().is_empty() {
        i += 1;
    }
    while i < lines.len() && read_entry(lines[i]).is_some() {
        i += 1;
    }

    let mut atlas = Atlas::default();
    let mut page: Option<usize> = None;
    while i < lines.len() {
        let line = lines[i];
        if line.trim().is_empty() {
            page = None;
            i += 1;
            continue;
        }

        let Some(page_index) = page else {
            let mut new_page = AtlasPage::new(line.trim());
            i += 1;
            while i < lines.len() {
                let Some(entry) = read_entry(lines[i]) else {
                    break;
                };
                apply_page_entry(&mut new_page, &entry, i + 1)?;
                i += 1;
            }
            atlas.pages.push(new_page);
            page = Some(atlas.pages.len() - 1);
            continue;
        };

        let mut region = AtlasRegion::new(line.trim(), page_index);
        i += 1;
        while i < lines.len() {
            let Some(entry) = read_entry(lines[i]) else {
                break;
            };
            apply_region_entry(&mut region, &entry, i + 1)?;
            i += 1;
        }
        if region.original_width == 0 && region.original_height == 0 {
            region.original_width = region.width;
            region.original_height = region.height;
        }

        let page = &atlas.pages[page_index];
        let (pw, ph) = (page.width.max(1) as f32, page.height.max(1) as f32);
        region.u = region.x as f32 / pw;
        region.v = region.y as f32 / ph;
        if region.degrees == 90 {
            region.u2 = (region.x + region.height) as f32 / pw;
            region.v2 = (region.y + region.width) as f32 / ph;
        } else {
            region.u2 = (region.x + region.width) as f32 / pw;
            region.v2 = (region.y + region.height) as f32 / ph;
        }
        atlas.regions.push(region);
    }

    if atlas.pages.is_empty() {
        return Err(Error::AtlasParse {
            line: 0,
            message: "atlas has no pages".to_string(),
        });
    }
    tracing::debug!(
        pages = atlas.pages.len(),
        regions = atlas.regions.len(),
        "parsed atlas"
    );
    Ok(atlas)
}

fn apply_page_entry(page: &mut AtlasPage, entry: &Entry<'_>, line: usize) -> Result<(), Error> {
    match entry.key {
        "size" => {
            page.width = parse_int(entry, 0, line)?.max(0) as u32;
            page.height = parse_int(entry, 1, line)?.max(0) as u32;
        }
        "format" => page.format = entry.values.first().map(|s| s.to_string()),
        "filter" => {
            let min = entry.values.first().copied().unwrap_or("Nearest");
            let mag = entry.values.get(1).copied().unwrap_or(min);
            page.min_filter = AtlasFilter::from_name(min);
            page.mag_filter = AtlasFilter::from_name(mag);
        }
        "repeat" => {
            let value = entry.values.first().copied().unwrap_or("");
            if value.contains('x') {
                page.wrap_u = AtlasWrap::Repeat;
            }
            if value.contains('y') {
                page.wrap_v = AtlasWrap::Repeat;
            }
        }
        "pma" => page.pma = entry.values.first() == Some(&"true"),
        "scale" => {
            let raw = entry.values.first().copied().unwrap_or("");
            let scale: f32 = raw.parse().map_err(|_| Error::AtlasParse {
                line,
                message: format!("invalid page scale '{raw}'"),
            })?;
            page.scale = if scale.is_finite() { scale } else { 1.0 };
        }
        other => tracing::warn!(key = other, line, "ignoring unknown atlas page entry"),
    }
    Ok(())
}

fn apply_region_entry(
    region: &mut AtlasRegion,
    entry: &Entry<'_>,
    line: usize,
) -> Result<(), Error> {
    match entry.key {
        "xy" => {
            region.x = parse_int(entry, 0, line)?;
            region.y = parse_int(entry, 1, line)?;
        }
        "size" => {
            region.width = parse_int(entry, 0, line)?;
            region.height = parse_int(entry, 1, line)?;
        }
        "bounds" => {
            region.x = parse_int(entry, 0, line)?;
            region.y = parse_int(entry, 1, line)?;
            region.width = parse_int(entry, 2, line)?;
            region.height = parse_int(entry, 3, line)?;
        }
        "offset" => {
            region.offset_x = parse_int(entry, 0, line)?;
            region.offset_y = parse_int(entry, 1, line)?;
        }
        "orig" => {
            region.original_width = parse_int(entry, 0, line)?;
            region.original_height = parse_int(entry, 1, line)?;
        }
        "offsets" => {
            region.offset_x = parse_int(entry, 0, line)?;
            region.offset_y = parse_int(entry, 1, line)?;
            region.original_width = parse_int(entry, 2, line)?;
            region.original_height = parse_int(entry, 3, line)?;
        }
        "rotate" => match entry.values.first().copied() {
            Some("true") => region.degrees = 90,
            Some("false") | None => {}
            Some(_) => region.degrees = parse_int(entry, 0, line)?.rem_euclid(360),
        },
        "index" => region.index = parse_int(entry, 0, line)?,
        key => {
            let values = (0..entry.values.len())
                .map(|i| parse_int(entry, i, line))
                .collect::<Result<Vec<_>, _>>()?;
            region.names.push(key.to_string());
            region.values.push(values);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() <= 1.0e-6
    }

    #[test]
    fn parse_page_header_and_region_bounds() {
        let atlas: Atlas = r#"
spineboy.png
size: 64,32
format: RGBA8888
filter: Linear,MipMapLinearLinear
repeat: x
pma: true
head
  bounds: 16, 8, 8, 4
"#
        .parse()
        .unwrap();

        assert_eq!(atlas.pages.len(), 1);
        let page = &atlas.pages[0];
        assert_eq!(page.name, "spineboy.png");
        assert_eq!((page.width, page.height), (64, 32));
        assert_eq!(page.format.as_deref(), Some("RGBA8888"));
        assert_eq!(page.min_filter, AtlasFilter::Linear);
        assert_eq!(page.mag_filter, AtlasFilter::MipMapLinearLinear);
        assert_eq!(page.wrap_u, AtlasWrap::Repeat);
        assert_eq!(page.wrap_v, AtlasWrap::ClampToEdge);
        assert!(page.pma);

        let head = atlas.find_region("head").unwrap();
        assert_eq!((head.x, head.y, head.width, head.height), (16, 8, 8, 4));
        assert_eq!((head.original_width, head.original_height), (8, 4));
        assert!(approx(head.u, 0.25));
        assert!(approx(head.v, 0.25));
        assert!(approx(head.u2, 0.375));
        assert!(approx(head.v2, 0.375));
    }

    #[test]
    fn rotated_region_swaps_extent_in_texture_space() {
        let atlas = Atlas::parse(
            "page.png\nsize: 100,100\narm\n  bounds: 10, 20, 30, 40\n  rotate: 90\n",
        )
        .unwrap();
        let arm = atlas.find_region("arm").unwrap();
        assert_eq!(arm.degrees, 90);
        assert!(approx(arm.u2, 0.5));
        assert!(approx(arm.v2, 0.5));
    }

    #[test]
    fn blank_line_starts_a_new_page() {
        let atlas = Atlas::parse(
            r#"
page0.png
size: 32,32
r0
  bounds: 0, 0, 1, 1

page1.png
size: 64,64
r1
  xy: 2, 3
  size: 4, 5
  orig: 8, 9
  offset: 1, 2
"#,
        )
        .unwrap();

        assert_eq!(atlas.pages.len(), 2);
        assert_eq!(atlas.find_region("r0").unwrap().page, 0);
        let r1 = atlas.find_region("r1").unwrap();
        assert_eq!(r1.page, 1);
        assert_eq!((r1.x, r1.y, r1.width, r1.height), (2, 3, 4, 5));
        assert_eq!((r1.original_width, r1.original_height), (8, 9));
        assert_eq!((r1.offset_x, r1.offset_y), (1, 2));
    }

    #[test]
    fn unknown_region_entries_are_kept_as_named_values() {
        let atlas = Atlas::parse(
            r#"
page.png
size: 64,64
button
  bounds: 0, 0, 10, 10
  split: 1, 2, 3, 4
  pad: 5, 6, 7, 8
  index: 3
"#,
        )
        .unwrap();
        let button = atlas.find_region("button").unwrap();
        assert_eq!(button.values_for("split"), Some(&[1, 2, 3, 4][..]));
        assert_eq!(button.values_for("pad"), Some(&[5, 6, 7, 8][..]));
        assert_eq!(button.index, 3);
        assert!(atlas.find_region_with_index("button", 3).is_some());
        assert!(atlas.find_region_with_index("button", 0).is_none());
    }

    #[test]
    fn invalid_numbers_report_the_line() {
        let err = Atlas::parse("page.png\nsize: 64,64\nhead\n  bounds: 0, x, 1, 1\n").unwrap_err();
        match err {
            Error::AtlasParse { line, .. } => assert_eq!(line, 4),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(Atlas::parse("\n\n").is_err());
    }
}
