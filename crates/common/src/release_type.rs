#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Refinement {
    Live,
    Remix,
}

// MusicBrainz release group type vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReleaseType {
    Album(Option<Refinement>),
    Ep(Option<Refinement>),
    Single(Option<Refinement>),
    Compilation(Option<Refinement>),
    Soundtrack,
    Mix,
    Mixtape,
}

impl ReleaseType {
    // The primary type comes first; an orphan secondary type implies Album.
    pub fn parse(tokens: &[String]) -> Option<Self> {
        let primary = tokens.first()?;
        Some(if primary.eq_ignore_ascii_case("album") {
            parse_secondary(tokens, 1, ReleaseType::Album)
        } else if primary.eq_ignore_ascii_case("ep") {
            parse_secondary(tokens, 1, ReleaseType::Ep)
        } else if primary.eq_ignore_ascii_case("single") {
            parse_secondary(tokens, 1, ReleaseType::Single)
        } else {
            parse_secondary(tokens, 0, ReleaseType::Album)
        })
    }
}

fn parse_secondary(
    tokens: &[String],
    index: usize,
    wrap: impl Fn(Option<Refinement>) -> ReleaseType,
) -> ReleaseType {
    let secondary = tokens.get(index).map(String::as_str);
    if secondary.is_some_and(|token| token.eq_ignore_ascii_case("compilation")) {
        // The tertiary type refines the compilation itself.
        let tertiary = tokens.get(index + 1).map(String::as_str);
        parse_leaf(tertiary, ReleaseType::Compilation)
    } else {
        parse_leaf(secondary, wrap)
    }
}

fn parse_leaf(token: Option<&str>, wrap: impl Fn(Option<Refinement>) -> ReleaseType) -> ReleaseType {
    let Some(token) = token else {
        return wrap(None);
    };
    if token.eq_ignore_ascii_case("soundtrack") {
        ReleaseType::Soundtrack
    } else if token.eq_ignore_ascii_case("mixtape/street") {
        ReleaseType::Mixtape
    } else if token.eq_ignore_ascii_case("dj-mix") {
        ReleaseType::Mix
    } else if token.eq_ignore_ascii_case("live") {
        wrap(Some(Refinement::Live))
    } else if token.eq_ignore_ascii_case("remix") {
        wrap(Some(Refinement::Remix))
    } else {
        wrap(None)
    }
}
