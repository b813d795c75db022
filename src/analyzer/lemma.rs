use std::{borrow::Cow, collections::HashMap};

/// Irregular verb forms -> base form.
const IRREGULAR_VERBS: &[(&str, &str)] = &[
    ("arose", "arise"), ("arisen", "arise"), ("ate", "eat"), ("eaten", "eat"),
    ("beaten", "beat"), ("began", "begin"), ("begun", "begin"), ("bitten", "bite"),
    ("bled", "bleed"), ("broke", "break"), ("broken", "break"), ("brought", "bring"),
    ("built", "build"), ("bought", "buy"), ("caught", "catch"), ("chose", "choose"),
    ("chosen", "choose"), ("came", "come"), ("dealt", "deal"), ("drove", "drive"),
    ("driven", "drive"), ("dug", "dig"), ("fell", "fall"), ("fallen", "fall"),
    ("fed", "feed"), ("felt", "feel"), ("fled", "flee"), ("flew", "fly"),
    ("flown", "fly"), ("forgot", "forget"), ("forgotten", "forget"), ("fought", "fight"),
    ("found", "find"), ("froze", "freeze"), ("frozen", "freeze"), ("gave", "give"),
    ("given", "give"), ("gone", "go"), ("went", "go"), ("grew", "grow"),
    ("grown", "grow"), ("held", "hold"), ("hid", "hide"), ("hidden", "hide"),
    ("hung", "hang"), ("kept", "keep"), ("knew", "know"), ("known", "know"),
    ("led", "lead"), ("left", "leave"), ("lost", "lose"), ("made", "make"),
    ("meant", "mean"), ("met", "meet"), ("paid", "pay"), ("ran", "run"),
    ("rose", "rise"), ("risen", "rise"), ("said", "say"), ("sank", "sink"),
    ("sunk", "sink"), ("saw", "see"), ("seen", "see"), ("sought", "seek"),
    ("sold", "sell"), ("sent", "send"), ("shook", "shake"), ("shaken", "shake"),
    ("shot", "shoot"), ("slept", "sleep"), ("slid", "slide"), ("sped", "speed"),
    ("spent", "spend"), ("spoke", "speak"), ("spoken", "speak"), ("sprang", "spring"),
    ("stood", "stand"), ("stole", "steal"), ("stolen", "steal"), ("stuck", "stick"),
    ("struck", "strike"), ("swept", "sweep"), ("swore", "swear"), ("sworn", "swear"),
    ("taught", "teach"), ("took", "take"), ("taken", "take"), ("told", "tell"),
    ("thought", "think"), ("threw", "throw"), ("thrown", "throw"), ("understood", "understand"),
    ("underwent", "undergo"), ("undergone", "undergo"), ("overtook", "overtake"),
    ("wept", "weep"), ("withdrew", "withdraw"), ("withdrawn", "withdraw"), ("woke", "wake"),
    ("won", "win"), ("wore", "wear"), ("worn", "wear"), ("wrote", "write"),
    ("written", "write"),
];

/// Reduces inflected verb forms to their base form.
///
/// Irregular forms come from a fixed table. Regular forms are only rewritten
/// where the stemmer that runs afterwards cannot recover the root on its own:
/// doubled final consonants (`running` -> `run`) and `-ies`/`-ied` (`carried`
/// -> `carry`). Everything else passes through unchanged.
#[derive(Debug, Clone)]
pub struct VerbLemmatizer {
    exceptions: HashMap<&'static str, &'static str>,
}

impl Default for VerbLemmatizer {
    fn default() -> Self {
        Self::new()
    }
}

impl VerbLemmatizer {
    pub fn new() -> Self {
        Self {
            exceptions: IRREGULAR_VERBS.iter().copied().collect(),
        }
    }

    pub fn lemmatize<'a>(&self, word: &'a str) -> Cow<'a, str> {
        if let Some(&base) = self.exceptions.get(word) {
            return Cow::Borrowed(base);
        }
        if word.len() > 4 {
            if let Some(stem) = word.strip_suffix("ies").or_else(|| word.strip_suffix("ied")) {
                return Cow::Owned(format!("{stem}y"));
            }
        }
        if let Some(stem) = word.strip_suffix("ing").or_else(|| word.strip_suffix("ed")) {
            if let Some(base) = undouble(stem) {
                return Cow::Borrowed(base);
            }
        }
        Cow::Borrowed(word)
    }
}

#[inline]
fn is_vowel(c: u8) -> bool {
    matches!(c, b'a' | b'e' | b'i' | b'o' | b'u')
}

/// `runn` -> `run`, `stopp` -> `stop`; `fall`/`pass`/`add` keep the pair.
/// None when the stem does not end in a doubled consonant.
fn undouble(stem: &str) -> Option<&str> {
    let bytes = stem.as_bytes();
    let n = bytes.len();
    if n < 3 || !stem.is_ascii() {
        return None;
    }
    let (last, prev) = (bytes[n - 1], bytes[n - 2]);
    if last != prev || is_vowel(last) {
        return None;
    }
    if n >= 4 && is_vowel(bytes[n - 3]) && !matches!(last, b'l' | b's' | b'z' | b'f') {
        Some(&stem[..n - 1])
    } else {
        Some(stem)
    }
}
