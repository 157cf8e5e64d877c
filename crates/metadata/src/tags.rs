use std::collections::HashMap;

use lofty::prelude::ItemKey;
use lofty::tag::{Tag, TagType};

pub type TagMap = HashMap<String, Vec<String>>;

// MP4 atoms and other frame-style containers fold into the ID3v2 dialect.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedTags {
    Id3v2 { frames: TagMap },
    Vorbis { fields: TagMap },
}

impl ParsedTags {
    pub fn from_tag(tag: &Tag) -> Self {
        match tag.tag_type() {
            TagType::VorbisComments => ParsedTags::Vorbis {
                fields: collect(tag, vorbis_key),
            },
            _ => ParsedTags::Id3v2 {
                frames: collect(tag, id3v2_key),
            },
        }
    }
}

fn collect(tag: &Tag, to_key: fn(&ItemKey) -> Option<String>) -> TagMap {
    let mut map = TagMap::new();
    for item in tag.items() {
        let Some(key) = to_key(item.key()) else {
            continue;
        };
        let Some(text) = item.value().text() else {
            continue;
        };
        map.entry(key).or_default().push(text.to_string());
    }
    map
}

fn id3v2_key(key: &ItemKey) -> Option<String> {
    let known = match key {
        ItemKey::TrackTitle => "TIT2",
        ItemKey::TrackTitleSortOrder => "TSOT",
        ItemKey::TrackArtist => "TPE1",
        ItemKey::TrackArtistSortOrder => "TSOP",
        ItemKey::AlbumTitle => "TALB",
        ItemKey::AlbumTitleSortOrder => "TSOA",
        ItemKey::AlbumArtist => "TPE2",
        ItemKey::AlbumArtistSortOrder => "TSO2",
        ItemKey::TrackNumber => "TRCK",
        ItemKey::DiscNumber => "TPOS",
        ItemKey::SetSubtitle => "TSST",
        ItemKey::RecordingDate => "TDRC",
        ItemKey::OriginalReleaseDate => "TDOR",
        ItemKey::ReleaseDate => "TDRL",
        ItemKey::Year => "TYER",
        ItemKey::Genre => "TCON",
        ItemKey::FlagCompilation => "TCMP",
        ItemKey::MusicBrainzTrackId => "TXXX:musicbrainz release track id",
        ItemKey::MusicBrainzReleaseId => "TXXX:musicbrainz album id",
        ItemKey::MusicBrainzArtistId => "TXXX:musicbrainz artist id",
        ItemKey::MusicBrainzReleaseArtistId => "TXXX:musicbrainz album artist id",
        ItemKey::ReplayGainTrackGain => "TXXX:replaygain_track_gain",
        ItemKey::ReplayGainAlbumGain => "TXXX:replaygain_album_gain",
        ItemKey::Unknown(name) => return Some(id3v2_unknown_key(name)),
        _ => return None,
    };
    Some(known.to_string())
}

// Free-form keys are either raw frame ids (legacy v2.3 date frames, GRP1)
// or TXXX descriptions. Descriptions are matched case-insensitively, so
// they are lowercased here once.
fn id3v2_unknown_key(name: &str) -> String {
    let is_frame_id = name.len() == 4
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    if is_frame_id {
        name.to_string()
    } else {
        format!("TXXX:{}", name.to_ascii_lowercase())
    }
}

fn vorbis_key(key: &ItemKey) -> Option<String> {
    let known = match key {
        ItemKey::TrackTitle => "title",
        ItemKey::TrackTitleSortOrder => "titlesort",
        ItemKey::TrackArtist => "artist",
        ItemKey::TrackArtistSortOrder => "artistsort",
        ItemKey::AlbumTitle => "album",
        ItemKey::AlbumTitleSortOrder => "albumsort",
        ItemKey::AlbumArtist => "albumartist",
        ItemKey::AlbumArtistSortOrder => "albumartistsort",
        ItemKey::TrackNumber => "tracknumber",
        ItemKey::DiscNumber => "discnumber",
        ItemKey::SetSubtitle => "discsubtitle",
        ItemKey::RecordingDate => "date",
        ItemKey::OriginalReleaseDate => "originaldate",
        ItemKey::Year => "year",
        ItemKey::Genre => "genre",
        ItemKey::FlagCompilation => "compilation",
        ItemKey::MusicBrainzTrackId => "musicbrainz_releasetrackid",
        ItemKey::MusicBrainzReleaseId => "musicbrainz_albumid",
        ItemKey::MusicBrainzArtistId => "musicbrainz_artistid",
        ItemKey::MusicBrainzReleaseArtistId => "musicbrainz_albumartistid",
        ItemKey::ReplayGainTrackGain => "replaygain_track_gain",
        ItemKey::ReplayGainAlbumGain => "replaygain_album_gain",
        ItemKey::Unknown(name) => return Some(name.to_ascii_lowercase()),
        _ => return None,
    };
    Some(known.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lofty::tag::{ItemValue, TagItem};

    #[test]
    fn vorbis_tags_map_to_lowercase_fields() {
        let mut tag = Tag::new(TagType::VorbisComments);
        tag.insert_text(ItemKey::TrackTitle, "Kickstart".to_string());
        tag.insert_unchecked(TagItem::new(
            ItemKey::Unknown("R128_TRACK_GAIN".to_string()),
            ItemValue::Text("-1792".to_string()),
        ));

        let ParsedTags::Vorbis { fields } = ParsedTags::from_tag(&tag) else {
            panic!("expected vorbis dialect");
        };
        assert_eq!(fields.get("title"), Some(&vec!["Kickstart".to_string()]));
        assert_eq!(
            fields.get("r128_track_gain"),
            Some(&vec!["-1792".to_string()])
        );
    }

    #[test]
    fn id3v2_tags_map_to_frame_ids() {
        let mut tag = Tag::new(TagType::Id3v2);
        tag.insert_text(ItemKey::TrackTitle, "Kickstart".to_string());
        tag.insert_unchecked(TagItem::new(
            ItemKey::Unknown("TDAT".to_string()),
            ItemValue::Text("0317".to_string()),
        ));
        tag.insert_unchecked(TagItem::new(
            ItemKey::Unknown("MusicBrainz Album Type".to_string()),
            ItemValue::Text("album".to_string()),
        ));

        let ParsedTags::Id3v2 { frames } = ParsedTags::from_tag(&tag) else {
            panic!("expected id3v2 dialect");
        };
        assert_eq!(frames.get("TIT2"), Some(&vec!["Kickstart".to_string()]));
        assert_eq!(frames.get("TDAT"), Some(&vec!["0317".to_string()]));
        assert_eq!(
            frames.get("TXXX:musicbrainz album type"),
            Some(&vec!["album".to_string()])
        );
    }

    #[test]
    fn non_vorbis_containers_fold_into_id3v2() {
        let tag = Tag::new(TagType::Mp4Ilst);
        assert!(matches!(
            ParsedTags::from_tag(&tag),
            ParsedTags::Id3v2 { .. }
        ));
    }
}
