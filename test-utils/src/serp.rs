//! Small synthetic search sessions shared by the click model tests.
//!
//! The fixtures are plain data so that they can be used by any crate without creating a
//! dependency cycle.

/// One snippet of a synthetic SERP together with the observed behaviour and its judgments.
#[derive(Clone, Copy, Debug)]
pub struct Doc {
    pub log_id: &'static str,
    pub classes: &'static [&'static str],
    /// `offset_parent;offset_left;offset_top;width;height`
    pub layout: &'static str,
    pub click: bool,
    pub fixation: bool,
    /// Encoded direct relevance judgment, e.g. `D2`.
    pub d: &'static str,
    /// Encoded result relevance judgment, e.g. `R3`.
    pub r: &'static str,
}

/// A synthetic SERP with its satisfaction label.
#[derive(Clone, Copy, Debug)]
pub struct Serp {
    pub query: &'static str,
    pub sat: bool,
    pub docs: [Doc; 5],
}

const fn doc(
    log_id: &'static str,
    classes: &'static [&'static str],
    layout: &'static str,
    (click, fixation): (bool, bool),
    d: &'static str,
    r: &'static str,
) -> Doc {
    Doc {
        log_id,
        classes,
        layout,
        click,
        fixation,
        d,
        r,
    }
}

const G: &[&str] = &["g"];
const KNOWLEDGE: &[&str] = &["g", "g-blk", "kno-kp", "mnr-c", "rhsvw"];
const CARD: &[&str] = &["_Nn", "_wbb", "card-section", "g"];

const CLICKED: (bool, bool) = (true, true);
const FIXATED: (bool, bool) = (false, true);
const UNKNOWN: (bool, bool) = (false, false);

/// Three SERPs of five documents each, mixing clicks, fixations and two column layouts.
pub fn serps() -> [Serp; 3] {
    [
        Serp {
            query: "weather berlin",
            sat: true,
            docs: [
                doc("s0_0", G, "372;16;102;496;147", CLICKED, "D2", "R3"),
                doc("s0_1", G, "372;16;260;496;120", FIXATED, "D1", "R2"),
                doc("s0_2", CARD, "372;16;392;512;240", UNKNOWN, "D1", "R1"),
                doc("s0_3", G, "372;16;644;496;98", UNKNOWN, "D0", "R0"),
                doc("s0_4", G, "372;16;754;496;102", UNKNOWN, "D0", "R1"),
            ],
        },
        Serp {
            query: "rust borrow checker",
            sat: false,
            docs: [
                doc("s1_0", G, "372;16;102;496;130", FIXATED, "D0", "R1"),
                doc("s1_1", G, "372;16;244;496;130", FIXATED, "D1", "R0"),
                doc("s1_2", G, "372;16;386;496;116", UNKNOWN, "D0", "R0"),
                doc("s1_3", KNOWLEDGE, "541;0;0;454;600", CLICKED, "D1", "R2"),
                doc("s1_4", G, "372;16;514;496;92", UNKNOWN, "D0", "R1"),
            ],
        },
        Serp {
            query: "eur to usd",
            sat: true,
            docs: [
                doc("s2_0", G, "372;16;102;539;896", CLICKED, "D2", "R3"),
                doc("s2_1", G, "372;16;1010;338;33", UNKNOWN, "D2", "R2"),
                doc("s2_2", G, "372;16;1055;496;147", FIXATED, "D1", "R3"),
                doc("s2_3", G, "372;16;1214;496;147", UNKNOWN, "D0", "R1"),
                doc("s2_4", G, "372;16;1373;496;147", UNKNOWN, "D-1", "R0"),
            ],
        },
    ]
}
