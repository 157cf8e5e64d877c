use std::sync::OnceLock;

use regex::Regex;

use common::Separators;

// A single value is tried as an ID3v1 code, then the packed v2.3 form,
// then split; multiple values only map through the integer table.
pub(crate) fn parse_genre_names(values: &[String], separators: &Separators) -> Vec<String> {
    if let [value] = values {
        parse_packed_genres(value, separators)
    } else {
        values
            .iter()
            .map(|value| match parse_id3v1_genre(value) {
                Some(name) => name.to_string(),
                None => value.clone(),
            })
            .collect()
    }
}

fn parse_packed_genres(value: &str, separators: &Separators) -> Vec<String> {
    if let Some(name) = parse_id3v1_genre(value) {
        return vec![name.to_string()];
    }
    if let Some(names) = parse_id3v2_genres(value) {
        return names;
    }
    separators.split(value)
}

fn parse_id3v1_genre(value: &str) -> Option<&'static str> {
    let Ok(numeric) = value.parse::<i64>() else {
        return match value {
            "CR" => Some("Cover"),
            "RX" => Some("Remix"),
            _ => None,
        };
    };
    usize::try_from(numeric)
        .ok()
        .and_then(|index| GENRE_TABLE.get(index).copied())
}

// Integer codes packed as (INT|RX|CR) groups, optionally followed by a
// plain name. This is the TCON format from the ID3v2.3 spec.
fn id3v2_genre_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^((?:\((\d+|RX|CR)\))*)(.+)?$").unwrap())
}

// None when decoding would be a no-op; the caller then splits instead.
fn parse_id3v2_genres(value: &str) -> Option<Vec<String>> {
    let captures = id3v2_genre_regex().captures(value)?;
    let mut genres: Vec<String> = Vec::new();

    let codes = captures.get(1).map_or("", |m| m.as_str());
    if !codes.is_empty() {
        for code in codes[1..codes.len() - 1].split(")(") {
            if let Some(name) = parse_id3v1_genre(code) {
                if !genres.iter().any(|existing| existing == name) {
                    genres.push(name.to_string());
                }
            }
        }
    }

    // Text after the codes is itself a genre. A leading "((" escapes a
    // name that starts with a literal paren.
    let name = captures.get(3).map_or("", |m| m.as_str());
    if !name.is_empty() {
        let name = match name.strip_prefix("((") {
            Some(stripped) => format!("({stripped}"),
            None => name.to_string(),
        };
        if !genres.contains(&name) {
            genres.push(name);
        }
    }

    if genres.len() == 1 && genres[0] == value {
        return None;
    }

    Some(genres)
}

// ID3v1 integer genres plus the Winamp extensions.
const GENRE_TABLE: [&str; 193] = [
    "Blues",
    "Classic Rock",
    "Country",
    "Dance",
    "Disco",
    "Funk",
    "Grunge",
    "Hip-Hop",
    "Jazz",
    "Metal",
    "New Age",
    "Oldies",
    "Other",
    "Pop",
    "R&B",
    "Rap",
    "Reggae",
    "Rock",
    "Techno",
    "Industrial",
    "Alternative",
    "Ska",
    "Death Metal",
    "Pranks",
    "Soundtrack",
    "Euro-Techno",
    "Ambient",
    "Trip-Hop",
    "Vocal",
    "Jazz+Funk",
    "Fusion",
    "Trance",
    "Classical",
    "Instrumental",
    "Acid",
    "House",
    "Game",
    "Sound Clip",
    "Gospel",
    "Noise",
    "AlternRock",
    "Bass",
    "Soul",
    "Punk",
    "Space",
    "Meditative",
    "Instrumental Pop",
    "Instrumental Rock",
    "Ethnic",
    "Gothic",
    "Darkwave",
    "Techno-Industrial",
    "Electronic",
    "Pop-Folk",
    "Eurodance",
    "Dream",
    "Southern Rock",
    "Comedy",
    "Cult",
    "Gangsta",
    "Top 40",
    "Christian Rap",
    "Pop/Funk",
    "Jungle",
    "Native American",
    "Cabaret",
    "New Wave",
    "Psychadelic",
    "Rave",
    "Showtunes",
    "Trailer",
    "Lo-Fi",
    "Tribal",
    "Acid Punk",
    "Acid Jazz",
    "Polka",
    "Retro",
    "Musical",
    "Rock & Roll",
    "Hard Rock",
    "Folk",
    "Folk-Rock",
    "National Folk",
    "Swing",
    "Fast Fusion",
    "Bebob",
    "Latin",
    "Revival",
    "Celtic",
    "Bluegrass",
    "Avantgarde",
    "Gothic Rock",
    "Progressive Rock",
    "Psychedelic Rock",
    "Symphonic Rock",
    "Slow Rock",
    "Big Band",
    "Chorus",
    "Easy Listening",
    "Acoustic",
    "Humour",
    "Speech",
    "Chanson",
    "Opera",
    "Chamber Music",
    "Sonata",
    "Symphony",
    "Booty Bass",
    "Primus",
    "Porn Groove",
    "Satire",
    "Slow Jam",
    "Club",
    "Tango",
    "Samba",
    "Folklore",
    "Ballad",
    "Power Ballad",
    "Rhythmic Soul",
    "Freestyle",
    "Duet",
    "Punk Rock",
    "Drum Solo",
    "A capella",
    "Euro-House",
    "Dance Hall",
    "Goa",
    "Drum & Bass",
    "Club-House",
    "Hardcore",
    "Terror",
    "Indie",
    "Britpop",
    "Negerpunk",
    "Polsk Punk",
    "Beat",
    "Christian Gangsta",
    "Heavy Metal",
    "Black Metal",
    "Crossover",
    "Contemporary Christian",
    "Christian Rock",
    "Merengue",
    "Salsa",
    "Thrash Metal",
    "Anime",
    "JPop",
    "Synthpop",
    "Abstract",
    "Art Rock",
    "Baroque",
    "Bhangra",
    "Big Beat",
    "Breakbeat",
    "Chillout",
    "Downtempo",
    "Dub",
    "EBM",
    "Eclectic",
    "Electro",
    "Electroclash",
    "Emo",
    "Experimental",
    "Garage",
    "Global",
    "IDM",
    "Illbient",
    "Industro-Goth",
    "Jam Band",
    "Krautrock",
    "Leftfield",
    "Lounge",
    "Math Rock",
    "New Romantic",
    "Nu-Breakz",
    "Post-Punk",
    "Post-Rock",
    "Psytrance",
    "Shoegaze",
    "Space Rock",
    "Trop Rock",
    "World Music",
    "Neoclassical",
    "Audiobook",
    "Audio Theatre",
    "Neue Deutsche Welle",
    "Podcast",
    "Indie Rock",
    "G-Funk",
    "Dubstep",
    "Garage Rock",
    "Psybient",
    "Future Garage",
];
