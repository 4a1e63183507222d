//! Synthetic dialogue generation
//!
//! Plot sentences draw from a vocabulary unique to each seed, so two
//! episodes share almost no content words. Filler sentences are built from
//! stopwords only and carry no weight in the sentence graph.

const STEMS: &[&str] = &[
    "reactor", "harbor", "detective", "evidence", "warehouse", "brother", "letter", "storm",
    "engine", "secret", "doctor", "bridge", "market", "shadow", "promise", "window", "train",
    "river", "money", "captain", "signal", "vault", "witness", "contract",
];

/// Sentences made only of stopwords
pub const FILLER: &[&str] = &[
    "Oh yes it is.",
    "No it was not.",
    "What do you have?",
    "Well we can do that.",
    "So what is it now?",
    "Yeah I did it.",
    "Are you with me?",
    "It was all for you.",
];

/// Deterministic LCG
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed ^ 0x9E37_79B9_7F4A_7C15)
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 33
    }

    pub fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }
}

/// Content words for one episode
pub fn episode_vocabulary(seed: u64) -> Vec<String> {
    STEMS.iter().map(|stem| format!("{}{}x", stem, seed)).collect()
}

/// One plot sentence of 5 to 8 episode words
pub fn plot_sentence(rng: &mut Lcg, vocabulary: &[String]) -> String {
    let len = 5 + rng.below(4);
    let words: Vec<&str> = (0..len)
        .map(|_| vocabulary[rng.below(vocabulary.len())].as_str())
        .collect();
    let mut sentence = words.join(" ");
    if let Some(first) = sentence.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    sentence.push('.');
    sentence
}

/// `plot + filler` sentences, filler spread evenly through the plot
pub fn episode_dialogue(seed: u64, plot: usize, filler: usize) -> String {
    let vocabulary = episode_vocabulary(seed);
    let mut rng = Lcg::new(seed);
    let total = plot + filler;

    (0..total)
        .map(|i| {
            let is_filler = filler > 0 && (i + 1) * filler / total > i * filler / total;
            if is_filler {
                FILLER[rng.below(FILLER.len())].to_string()
            } else {
                plot_sentence(&mut rng, &vocabulary)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Default episode shape used by pipeline tests
pub fn episode_text(seed: u64) -> String {
    episode_dialogue(seed, 120, 60)
}
