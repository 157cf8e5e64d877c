use common::{correct_whitespace, Date, RawSong, Separators};

use crate::genre::parse_genre_names;
use crate::tags::{ParsedTags, TagMap};

const COMPILATION_ALBUM_ARTIST: &str = "Various Artists";
const COMPILATION_RELEASE_TYPE: &str = "compilation";

// Fields with no usable tag value keep whatever the caller already
// populated; malformed values are skipped field by field.
pub fn interpret(raw: &mut RawSong, tags: &ParsedTags, separators: &Separators) {
    match tags {
        ParsedTags::Id3v2 { frames } => populate_from_id3v2(raw, frames, separators),
        ParsedTags::Vorbis { fields } => populate_from_vorbis(raw, fields, separators),
    }
}

fn populate_from_id3v2(raw: &mut RawSong, frames: &TagMap, separators: &Separators) {
    set_single(
        &mut raw.musicbrainz_id,
        frames.get("TXXX:musicbrainz release track id"),
    );
    set_single(&mut raw.name, frames.get("TIT2"));
    set_single(&mut raw.sort_name, frames.get("TSOT"));

    set_position(&mut raw.track, frames.get("TRCK"));
    set_position(&mut raw.disc, frames.get("TPOS"));
    set_single(&mut raw.subtitle, frames.get("TSST"));

    // The v2.4 original date resolves reissues, then the recording date,
    // the release date, and last whatever the v2.3 frames reconstruct.
    let date = parse_timestamp(frames.get("TDOR"))
        .or_else(|| parse_timestamp(frames.get("TDRC")))
        .or_else(|| parse_timestamp(frames.get("TDRL")))
        .or_else(|| parse_legacy_id3_date(frames));
    if let Some(date) = date {
        raw.date = Some(date);
    }

    set_single(
        &mut raw.album_musicbrainz_id,
        frames.get("TXXX:musicbrainz album id"),
    );
    set_single(&mut raw.album_name, frames.get("TALB"));
    set_single(&mut raw.album_sort_name, frames.get("TSOA"));
    set_multi(
        &mut raw.release_types,
        frames
            .get("TXXX:musicbrainz album type")
            .or_else(|| frames.get("TXXX:releasetype"))
            .or_else(|| frames.get("GRP1")),
        separators,
    );

    set_multi(
        &mut raw.artist_musicbrainz_ids,
        frames.get("TXXX:musicbrainz artist id"),
        separators,
    );
    set_multi(
        &mut raw.artist_names,
        frames.get("TXXX:artists").or_else(|| frames.get("TPE1")),
        separators,
    );
    set_multi(
        &mut raw.artist_sort_names,
        frames
            .get("TXXX:artists_sort")
            .or_else(|| frames.get("TSOP")),
        separators,
    );

    set_multi(
        &mut raw.album_artist_musicbrainz_ids,
        frames.get("TXXX:musicbrainz album artist id"),
        separators,
    );
    set_multi(
        &mut raw.album_artist_names,
        frames
            .get("TXXX:albumartists")
            .or_else(|| frames.get("TPE2")),
        separators,
    );
    set_multi(
        &mut raw.album_artist_sort_names,
        frames
            .get("TXXX:albumartists_sort")
            .or_else(|| frames.get("TSO2")),
        separators,
    );

    if let Some(values) = frames.get("TCON") {
        raw.genre_names = parse_genre_names(values, separators);
    }

    let compilation = frames
        .get("TCMP")
        .or_else(|| frames.get("TXXX:compilation"))
        .or_else(|| frames.get("TXXX:itunescompilation"));
    if is_compilation_flag(compilation) {
        apply_compilation_defaults(raw);
    }

    if let Some(adjustment) = frames
        .get("TXXX:replaygain_track_gain")
        .and_then(|values| parse_adjustment(values))
    {
        raw.replaygain_track_adjustment = Some(adjustment);
    }
    if let Some(adjustment) = frames
        .get("TXXX:replaygain_album_gain")
        .and_then(|values| parse_adjustment(values))
    {
        raw.replaygain_album_adjustment = Some(adjustment);
    }
}

fn populate_from_vorbis(raw: &mut RawSong, fields: &TagMap, separators: &Separators) {
    set_single(
        &mut raw.musicbrainz_id,
        fields.get("musicbrainz_releasetrackid"),
    );
    set_single(&mut raw.name, fields.get("title"));
    set_single(&mut raw.sort_name, fields.get("titlesort"));

    set_position(&mut raw.track, fields.get("tracknumber"));
    set_position(&mut raw.disc, fields.get("discnumber"));
    set_single(&mut raw.subtitle, fields.get("discsubtitle"));

    // The original date resolves reissues, then the date field, then year.
    let date = parse_timestamp(fields.get("originaldate"))
        .or_else(|| parse_timestamp(fields.get("date")))
        .or_else(|| parse_timestamp(fields.get("year")));
    if let Some(date) = date {
        raw.date = Some(date);
    }

    set_single(&mut raw.album_musicbrainz_id, fields.get("musicbrainz_albumid"));
    set_single(&mut raw.album_name, fields.get("album"));
    set_single(&mut raw.album_sort_name, fields.get("albumsort"));
    set_multi(&mut raw.release_types, fields.get("releasetype"), separators);

    set_multi(
        &mut raw.artist_musicbrainz_ids,
        fields.get("musicbrainz_artistid"),
        separators,
    );
    set_multi(
        &mut raw.artist_names,
        fields.get("artists").or_else(|| fields.get("artist")),
        separators,
    );
    set_multi(
        &mut raw.artist_sort_names,
        fields
            .get("artists_sort")
            .or_else(|| fields.get("artistsort")),
        separators,
    );

    set_multi(
        &mut raw.album_artist_musicbrainz_ids,
        fields.get("musicbrainz_albumartistid"),
        separators,
    );
    set_multi(
        &mut raw.album_artist_names,
        fields
            .get("albumartists")
            .or_else(|| fields.get("albumartist")),
        separators,
    );
    set_multi(
        &mut raw.album_artist_sort_names,
        fields
            .get("albumartists_sort")
            .or_else(|| fields.get("albumartistsort")),
        separators,
    );

    if let Some(values) = fields.get("genre") {
        raw.genre_names = parse_genre_names(values, separators);
    }

    let compilation = fields
        .get("compilation")
        .or_else(|| fields.get("itunescompilation"));
    if is_compilation_flag(compilation) {
        apply_compilation_defaults(raw);
    }

    // Opus-style R128 values take precedence over classic ReplayGain.
    let track = fields
        .get("r128_track_gain")
        .and_then(|values| parse_r128_adjustment(values))
        .or_else(|| {
            fields
                .get("replaygain_track_gain")
                .and_then(|values| parse_adjustment(values))
        });
    if let Some(adjustment) = track {
        raw.replaygain_track_adjustment = Some(adjustment);
    }
    let album = fields
        .get("r128_album_gain")
        .and_then(|values| parse_r128_adjustment(values))
        .or_else(|| {
            fields
                .get("replaygain_album_gain")
                .and_then(|values| parse_adjustment(values))
        });
    if let Some(adjustment) = album {
        raw.replaygain_album_adjustment = Some(adjustment);
    }
}

fn set_single(slot: &mut Option<String>, values: Option<&Vec<String>>) {
    let first = values.and_then(|values| values.first());
    if let Some(value) = first.and_then(|value| correct_whitespace(value)) {
        *slot = Some(value);
    }
}

fn set_multi(slot: &mut Vec<String>, values: Option<&Vec<String>>, separators: &Separators) {
    if let Some(values) = values {
        *slot = split_values(values, separators);
    }
}

// Already-multiple values are never split further.
fn split_values(values: &[String], separators: &Separators) -> Vec<String> {
    if let [value] = values {
        separators.split(value)
    } else {
        values
            .iter()
            .filter_map(|value| correct_whitespace(value))
            .collect()
    }
}

fn set_position(slot: &mut Option<u32>, values: Option<&Vec<String>>) {
    let first = values.and_then(|values| values.first());
    if let Some(position) = first.and_then(|value| parse_position(value)) {
        *slot = Some(position);
    }
}

// "NN" or "NN/TT". Zero is absent no matter what the total says.
fn parse_position(value: &str) -> Option<u32> {
    let number = value.split('/').next()?.trim();
    let position = number.parse::<u32>().ok()?;
    (position > 0).then_some(position)
}

fn parse_timestamp(values: Option<&Vec<String>>) -> Option<Date> {
    values
        .and_then(|values| values.first())
        .and_then(|value| Date::parse(value))
}

// TDAT and TIME are fixed four-digit MMDD and HHMM strings.
fn parse_legacy_id3_date(frames: &TagMap) -> Option<Date> {
    let year = first_int(frames.get("TORY")).or_else(|| first_int(frames.get("TYER")))?;

    let Some(mmdd) = four_digits(frames.get("TDAT")) else {
        return Date::from_year(year);
    };
    let month: i32 = mmdd[0..2].parse().ok()?;
    let day: i32 = mmdd[2..4].parse().ok()?;

    let Some(hhmm) = four_digits(frames.get("TIME")) else {
        return Date::from_ymd(year, month, day);
    };
    let hour: i32 = hhmm[0..2].parse().ok()?;
    let minute: i32 = hhmm[2..4].parse().ok()?;

    Date::from_ymd_hm(year, month, day, hour, minute)
}

fn first_int(values: Option<&Vec<String>>) -> Option<i32> {
    values?.first()?.parse().ok()
}

fn four_digits(values: Option<&Vec<String>>) -> Option<&str> {
    values?
        .first()
        .filter(|value| value.len() == 4 && value.chars().all(|c| c.is_ascii_digit()))
        .map(String::as_str)
}

fn is_compilation_flag(values: Option<&Vec<String>>) -> bool {
    values.is_some_and(|values| matches!(values.as_slice(), [flag] if flag == "1"))
}

fn apply_compilation_defaults(raw: &mut RawSong) {
    if raw.album_artist_names.is_empty() {
        raw.album_artist_names = vec![COMPILATION_ALBUM_ARTIST.to_string()];
    }
    if raw.release_types.is_empty() {
        raw.release_types = vec![COMPILATION_RELEASE_TYPE.to_string()];
    }
}

// Units and stray text are dropped. Zero means no adjustment.
fn parse_adjustment(values: &[String]) -> Option<f32> {
    let cleaned: String = values
        .first()?
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    let value = cleaned.parse::<f32>().ok()?;
    (value != 0.0).then_some(value)
}

// 1/256 dB steps relative to -23 LUFS, rescaled to ReplayGain's -18 LUFS.
fn parse_r128_adjustment(values: &[String]) -> Option<f32> {
    parse_adjustment(values).map(|value| value / 256.0 + 5.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag_map(entries: &[(&str, &[&str])]) -> TagMap {
        entries
            .iter()
            .map(|(key, values)| {
                (
                    key.to_string(),
                    values.iter().map(|v| v.to_string()).collect(),
                )
            })
            .collect()
    }

    fn id3v2(entries: &[(&str, &[&str])]) -> ParsedTags {
        ParsedTags::Id3v2 {
            frames: tag_map(entries),
        }
    }

    fn vorbis(entries: &[(&str, &[&str])]) -> ParsedTags {
        ParsedTags::Vorbis {
            fields: tag_map(entries),
        }
    }

    #[test]
    fn id3v2_fields_populate() {
        let tags = id3v2(&[
            ("TIT2", &[" Kickstart "]),
            ("TALB", &["Amalgam"]),
            ("TPE1", &["Artist A; Artist B"]),
            ("TRCK", &["3/12"]),
            ("TPOS", &["2"]),
            ("TSST", &["Second Half"]),
            ("TCON", &["17"]),
        ]);
        let mut raw = RawSong::new();
        interpret(&mut raw, &tags, &Separators::from_chars(";"));

        assert_eq!(raw.name.as_deref(), Some("Kickstart"));
        assert_eq!(raw.album_name.as_deref(), Some("Amalgam"));
        assert_eq!(
            raw.artist_names,
            vec!["Artist A".to_string(), "Artist B".to_string()]
        );
        assert_eq!(raw.track, Some(3));
        assert_eq!(raw.disc, Some(2));
        assert_eq!(raw.subtitle.as_deref(), Some("Second Half"));
        assert_eq!(raw.genre_names, vec!["Rock".to_string()]);
    }

    #[test]
    fn txxx_frames_win_over_text_frames() {
        let tags = id3v2(&[
            ("TPE1", &["Wrong"]),
            ("TXXX:artists", &["Right A", "Right B"]),
            ("TXXX:musicbrainz release track id", &["abc-123"]),
            ("TXXX:releasetype", &["album", "live"]),
            ("GRP1", &["single"]),
        ]);
        let mut raw = RawSong::new();
        interpret(&mut raw, &tags, &Separators::default());

        assert_eq!(
            raw.artist_names,
            vec!["Right A".to_string(), "Right B".to_string()]
        );
        assert_eq!(raw.musicbrainz_id.as_deref(), Some("abc-123"));
        assert_eq!(
            raw.release_types,
            vec!["album".to_string(), "live".to_string()]
        );
    }

    #[test]
    fn multiple_values_are_not_split_again() {
        let tags = id3v2(&[("TXXX:artists", &["A; B", "C"])]);
        let mut raw = RawSong::new();
        interpret(&mut raw, &tags, &Separators::from_chars(";"));
        assert_eq!(raw.artist_names, vec!["A; B".to_string(), "C".to_string()]);
    }

    #[test]
    fn id3v2_date_hierarchy() {
        let tags = id3v2(&[("TDRC", &["2016-08-16"]), ("TDOR", &["1994"])]);
        let mut raw = RawSong::new();
        interpret(&mut raw, &tags, &Separators::default());
        assert_eq!(raw.date.as_ref().map(Date::to_string).as_deref(), Some("1994"));

        let tags = id3v2(&[("TDRL", &["2016-08-16"]), ("TDRC", &["2015"])]);
        let mut raw = RawSong::new();
        interpret(&mut raw, &tags, &Separators::default());
        assert_eq!(raw.date.as_ref().map(Date::to_string).as_deref(), Some("2015"));
    }

    #[test]
    fn legacy_id3_date_reconstruction() {
        let tags = id3v2(&[("TYER", &["1999"]), ("TDAT", &["0317"]), ("TIME", &["2230"])]);
        let mut raw = RawSong::new();
        interpret(&mut raw, &tags, &Separators::default());
        assert_eq!(
            raw.date.as_ref().map(Date::to_string).as_deref(),
            Some("1999-03-17T22:30Z")
        );

        // TORY wins over TYER, and a malformed TDAT degrades to a year.
        let tags = id3v2(&[("TORY", &["1994"]), ("TYER", &["1999"]), ("TDAT", &["17"])]);
        let mut raw = RawSong::new();
        interpret(&mut raw, &tags, &Separators::default());
        assert_eq!(raw.date.as_ref().map(Date::to_string).as_deref(), Some("1994"));
    }

    #[test]
    fn vorbis_fields_populate() {
        let tags = vorbis(&[
            ("title", &["Comatose"]),
            ("artists", &["Underscore"]),
            ("artist", &["Wrong"]),
            ("originaldate", &["2021-06-05"]),
            ("date", &["2023-01-01"]),
            ("tracknumber", &["5"]),
            ("discnumber", &["2/2"]),
        ]);
        let mut raw = RawSong::new();
        interpret(&mut raw, &tags, &Separators::default());

        assert_eq!(raw.name.as_deref(), Some("Comatose"));
        assert_eq!(raw.artist_names, vec!["Underscore".to_string()]);
        assert_eq!(
            raw.date.as_ref().map(Date::to_string).as_deref(),
            Some("2021-06-05")
        );
        assert_eq!(raw.track, Some(5));
        assert_eq!(raw.disc, Some(2));
    }

    #[test]
    fn zero_positions_are_absent() {
        for field in ["0", "0/4"] {
            let tags = vorbis(&[("tracknumber", &[field])]);
            let mut raw = RawSong::new();
            interpret(&mut raw, &tags, &Separators::default());
            assert_eq!(raw.track, None, "{field:?} should not produce a track");
        }
    }

    #[test]
    fn compilation_flag_fills_defaults_only_when_empty() {
        let tags = vorbis(&[("compilation", &["1"])]);
        let mut raw = RawSong::new();
        interpret(&mut raw, &tags, &Separators::default());
        assert_eq!(raw.album_artist_names, vec!["Various Artists".to_string()]);
        assert_eq!(raw.release_types, vec!["compilation".to_string()]);

        let tags = vorbis(&[("compilation", &["1"]), ("albumartist", &["Sonder"])]);
        let mut raw = RawSong::new();
        interpret(&mut raw, &tags, &Separators::default());
        assert_eq!(raw.album_artist_names, vec!["Sonder".to_string()]);
        assert_eq!(raw.release_types, vec!["compilation".to_string()]);
    }

    #[test]
    fn compilation_flag_must_be_exactly_one() {
        for values in [&["0"][..], &["1", "1"][..], &["true"][..]] {
            let tags = vorbis(&[("compilation", values)]);
            let mut raw = RawSong::new();
            interpret(&mut raw, &tags, &Separators::default());
            assert!(raw.album_artist_names.is_empty());
        }
    }

    #[test]
    fn replaygain_adjustments_parse() {
        let tags = vorbis(&[
            ("replaygain_track_gain", &["-2.5 dB"]),
            ("replaygain_album_gain", &["+1.25 dB"]),
        ]);
        let mut raw = RawSong::new();
        interpret(&mut raw, &tags, &Separators::default());
        assert_eq!(raw.replaygain_track_adjustment, Some(-2.5));
        assert_eq!(raw.replaygain_album_adjustment, Some(1.25));
    }

    #[test]
    fn r128_adjustments_rescale_and_win() {
        let tags = vorbis(&[
            ("r128_track_gain", &["-1792"]),
            ("replaygain_track_gain", &["-2.5 dB"]),
        ]);
        let mut raw = RawSong::new();
        interpret(&mut raw, &tags, &Separators::default());
        // -1792 / 256 + 5
        assert_eq!(raw.replaygain_track_adjustment, Some(-2.0));
    }

    #[test]
    fn zero_adjustments_are_absent() {
        let tags = id3v2(&[("TXXX:replaygain_track_gain", &["0.00 dB"])]);
        let mut raw = RawSong::new();
        interpret(&mut raw, &tags, &Separators::default());
        assert_eq!(raw.replaygain_track_adjustment, None);
    }

    #[test]
    fn absent_tags_keep_existing_fields() {
        let tags = id3v2(&[("TIT2", &["Retitled"])]);
        let mut raw = RawSong::new();
        raw.name = Some("Original".to_string());
        raw.genre_names = vec!["Folk".to_string()];
        raw.track = Some(4);
        interpret(&mut raw, &tags, &Separators::default());

        assert_eq!(raw.name.as_deref(), Some("Retitled"));
        assert_eq!(raw.genre_names, vec!["Folk".to_string()]);
        assert_eq!(raw.track, Some(4));
    }

    #[test]
    fn malformed_values_are_skipped() {
        let tags = id3v2(&[("TRCK", &["x/4"]), ("TDRC", &["not a date"])]);
        let mut raw = RawSong::new();
        interpret(&mut raw, &tags, &Separators::default());
        assert_eq!(raw.track, None);
        assert_eq!(raw.date, None);
    }
}
