use std::collections::HashMap;

use log::{debug, warn};

use crate::data::{action::Action, log_item::LogItem};

/// Time thresholds (in milliseconds) used to interpret an interaction trace.
#[derive(Clone, Copy, Debug)]
pub struct ProcessorThresholds {
    /// Minimal dwell time on a snippet to count as a fixation.
    pub fixation: i64,
    /// Minimal time after a click on a snippet for it to count as a long click.
    pub long_click: i64,
    /// A gap between two events this long ends the session.
    pub session_cut_off: i64,
}

impl Default for ProcessorThresholds {
    fn default() -> Self {
        Self {
            fixation: 200,
            long_click: 30 * 1000,
            session_cut_off: 30 * 60 * 1000,
        }
    }
}

/// An interaction event together with the page element it targets.
#[derive(Clone, Debug)]
pub struct TraceEvent {
    pub emu_id: String,
    pub action: Action,
}

/// Updates fixation and long click flags of the log items of one SERP using the context of all
/// other events on the page.
#[derive(Default)]
pub struct SessionLogProcessor {
    thresholds: ProcessorThresholds,
    events: Vec<TraceEvent>,
    /// Maps element ids to the index of the log item they belong to.
    emu_id_to_item: HashMap<String, usize>,
}

impl SessionLogProcessor {
    pub fn new(thresholds: ProcessorThresholds) -> Self {
        Self {
            thresholds,
            ..Self::default()
        }
    }

    pub fn push_event(&mut self, emu_id: impl Into<String>, action: Action) {
        self.events.push(TraceEvent {
            emu_id: emu_id.into(),
            action,
        });
    }

    /// Declares that the page element belongs to the snippet of the log item at `item` index.
    pub fn map_element(&mut self, emu_id: impl Into<String>, item: usize) {
        self.emu_id_to_item.insert(emu_id.into(), item);
    }

    fn item_of(&self, event: &TraceEvent) -> Option<usize> {
        self.emu_id_to_item.get(&event.emu_id).copied()
    }

    /// Walks the trace in chronological order and finalizes the flags of the `items`.
    ///
    /// The indices used in [`map_element()`] refer to `items`.
    ///
    /// [`map_element()`]: Self::map_element
    pub fn process(&mut self, items: &mut [LogItem]) {
        if self.events.is_empty() {
            return;
        }
        self.events.sort_by_key(|event| event.action.ts);

        let thresholds = self.thresholds;
        // log item -> timestamp of (re-)entering its snippet
        let mut enter_times = HashMap::new();
        if let Some(first) = self.item_of(&self.events[0]) {
            enter_times.insert(first, self.events[0].action.ts);
        }

        let mut end_ts = None;
        for (prev, cur) in self.events.iter().zip(self.events.iter().skip(1)) {
            let prev_item = self.item_of(prev);
            let cur_item = self.item_of(cur);
            let cur_ts = cur.action.ts;
            let prev_ts = prev.action.ts;

            if cur_item != prev_item {
                if let Some(cur_item) = cur_item {
                    enter_times.insert(cur_item, cur_ts);
                }
                if let Some(prev_item) = prev_item {
                    let entered = enter_times.get(&prev_item).copied().unwrap_or(prev_ts);
                    if let Some(item) = item_at(items, prev_item) {
                        if cur_ts - entered >= thresholds.fixation {
                            item.fixation = true;
                        }
                        if item.click() && cur_ts - prev_ts >= thresholds.long_click {
                            item.long_click = true;
                        }
                    }
                }
            }

            if cur_ts - prev_ts >= thresholds.session_cut_off {
                debug!(
                    "Session break of {} min after {}",
                    (cur_ts - prev_ts) / 60_000,
                    prev_ts
                );
                end_ts = Some(prev_ts);
                break;
            }
        }

        if let Some(end_ts) = end_ts {
            for event in &self.events {
                if let Some(item) = self.item_of(event) {
                    if let Some(item) = item_at(items, item) {
                        item.clear_after(end_ts);
                    }
                }
            }
        } else if let Some(last) = self.events.last().and_then(|event| self.item_of(event)) {
            // the session ended while the last snippet was inspected
            if let Some(item) = item_at(items, last) {
                item.fixation = true;
                if item.click() {
                    item.long_click = true;
                }
            }
        }
    }
}

/// The log item at the mapped index, elements mapped past the items are ignored.
fn item_at(items: &mut [LogItem], idx: usize) -> Option<&mut LogItem> {
    let len = items.len();
    let item = items.get_mut(idx);
    if item.is_none() {
        warn!("Element mapped to log item {} of only {}", idx, len);
    }
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::action::ActionKind;

    const MIN: i64 = 60 * 1000;

    fn processor(trace: &[(&str, ActionKind, i64)]) -> SessionLogProcessor {
        let mut processor = SessionLogProcessor::default();
        for &(emu_id, kind, ts) in trace {
            processor.push_event(emu_id, Action::new(kind, ts));
        }
        processor.map_element("a", 0);
        processor.map_element("a_link", 0);
        processor.map_element("b", 1);
        processor.map_element("c", 2);
        processor
    }

    fn items(trace: &[(&str, ActionKind, i64)]) -> Vec<LogItem> {
        let actions_of = |elements: &[&str]| {
            trace
                .iter()
                .filter(|(emu_id, _, _)| elements.contains(emu_id))
                .map(|&(_, kind, ts)| Action::new(kind, ts))
                .collect()
        };
        vec![
            LogItem::new("s_a", actions_of(&["a", "a_link"])),
            LogItem::new("s_b", actions_of(&["b"])),
            LogItem::new("s_c", actions_of(&["c"])),
        ]
    }

    #[test]
    fn test_fixation_needs_dwell_time() {
        let trace = [
            ("a", ActionKind::Other, 0),
            ("b", ActionKind::Other, 100),
            ("c", ActionKind::Other, 500),
            ("page", ActionKind::Other, 600),
        ];
        let mut items = items(&trace);
        processor(&trace).process(&mut items);

        assert!(!items[0].fixation);
        assert!(items[1].fixation);
        assert!(!items[2].fixation);
    }

    #[test]
    fn test_unordered_trace_is_sorted() {
        let trace = [
            ("page", ActionKind::Other, 600),
            ("b", ActionKind::Other, 100),
            ("a", ActionKind::Other, 0),
            ("c", ActionKind::Other, 500),
        ];
        let mut items = items(&trace);
        processor(&trace).process(&mut items);

        assert!(!items[0].fixation);
        assert!(items[1].fixation);
    }

    #[test]
    fn test_elements_of_the_same_snippet_are_not_a_transition() {
        let trace = [
            ("a", ActionKind::Other, 0),
            ("a_link", ActionKind::Other, 150),
            ("page", ActionKind::Other, 250),
        ];
        let mut items = items(&trace);
        processor(&trace).process(&mut items);

        assert!(items[0].fixation);
    }

    #[test]
    fn test_long_click() {
        let trace = [
            ("a", ActionKind::Click, 0),
            ("b", ActionKind::Other, MIN),
            ("c", ActionKind::Click, MIN + 10),
            ("b", ActionKind::Other, MIN + 20),
        ];
        let mut items = items(&trace);
        processor(&trace).process(&mut items);

        assert!(items[0].long_click);
        assert!(!items[2].long_click);
        assert!(items[2].fixation);
    }

    #[test]
    fn test_last_item_is_fixated_and_long_clicked() {
        let trace = [("a", ActionKind::Other, 0), ("b", ActionKind::Click, 10)];
        let mut items = items(&trace);
        processor(&trace).process(&mut items);

        assert!(!items[0].fixation);
        assert!(items[1].fixation);
        assert!(items[1].long_click);
    }

    #[test]
    fn test_session_break_truncates_actions() {
        let trace = [
            ("a", ActionKind::Other, 0),
            ("b", ActionKind::Click, 1000),
            ("a", ActionKind::Other, 2000),
            ("c", ActionKind::Other, 2000 + 40 * MIN),
            ("b", ActionKind::Other, 2000 + 41 * MIN),
            ("page", ActionKind::Other, 2000 + 42 * MIN),
        ];
        let mut items = items(&trace);
        processor(&trace).process(&mut items);

        for item in &items {
            assert!(item.actions.iter().all(|action| action.ts <= 2000));
        }
        assert_eq!(items[0].actions.len(), 2);
        assert_eq!(items[1].actions.len(), 1);
        assert!(items[2].actions.is_empty());
        assert!(items[0].fixation);
        assert!(items[1].fixation);
        assert!(!items[1].long_click);
        assert!(!items[2].fixation);
    }

    #[test]
    fn test_elements_mapped_past_the_items_are_ignored() {
        let trace = [
            ("a", ActionKind::Click, 0),
            ("d", ActionKind::Click, 500),
            ("a", ActionKind::Other, 1000),
            ("d", ActionKind::Other, 1000 + 40 * MIN),
        ];
        let mut items = items(&trace);
        let mut processor = processor(&trace);
        processor.map_element("d", 3);
        processor.process(&mut items);

        assert!(items[0].fixation);
        assert!(items[0].actions.iter().all(|action| action.ts <= 1000));
        assert!(!items[1].fixation && !items[2].fixation);

        let mut single = vec![LogItem::new("s_a", Vec::new())];
        let mut processor = SessionLogProcessor::default();
        processor.push_event("a", Action::new(ActionKind::Other, 0));
        processor.map_element("a", 3);
        processor.process(&mut single);
        assert!(!single[0].fixation);
    }

    #[test]
    fn test_empty_trace_is_a_no_op() {
        let mut items = items(&[]);
        SessionLogProcessor::default().process(&mut items);
        assert!(items.iter().all(|item| !item.fixation && !item.long_click));
    }
}
