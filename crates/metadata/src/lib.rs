mod genre;
mod interpret;
mod tags;

pub use interpret::interpret;
pub use tags::{ParsedTags, TagMap};

use std::path::Path;

use lofty::error::LoftyError;
use lofty::picture::{Picture, PictureType};
use lofty::prelude::{AudioFile, TaggedFileExt};

// Everything pulled out of one audio file in a single demuxer pass.
#[derive(Debug, Default, Clone)]
pub struct ParsedFile {
    pub tags: Option<ParsedTags>,
    pub duration_ms: Option<u64>,
    pub cover_key: Option<String>,
}

#[derive(Debug)]
pub enum MetadataError {
    Io(std::io::Error),
    Lofty(LoftyError),
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::Io(err) => write!(f, "io error: {}", err),
            MetadataError::Lofty(err) => write!(f, "demux error: {}", err),
        }
    }
}

impl std::error::Error for MetadataError {}

impl From<std::io::Error> for MetadataError {
    fn from(err: std::io::Error) -> Self {
        MetadataError::Io(err)
    }
}

impl From<LoftyError> for MetadataError {
    fn from(err: LoftyError) -> Self {
        MetadataError::Lofty(err)
    }
}

pub fn read_file(path: &Path) -> Result<ParsedFile, MetadataError> {
    let tagged_file = lofty::read_from_path(path)?;
    let properties = tagged_file.properties();

    let mut parsed = ParsedFile::default();

    let duration_ms = properties.duration().as_millis();
    if duration_ms > 0 {
        parsed.duration_ms = Some(duration_ms.min(u128::from(u64::MAX)) as u64);
    }

    if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
        parsed.tags = Some(ParsedTags::from_tag(tag));
        if let Some(picture) = pick_picture(tag.pictures()) {
            parsed.cover_key = Some(common::content_key(picture.data()));
        }
    }

    Ok(parsed)
}

fn pick_picture(pictures: &[Picture]) -> Option<&Picture> {
    for picture in pictures {
        if picture.pic_type() == PictureType::CoverFront {
            return Some(picture);
        }
    }
    pictures.first()
}
