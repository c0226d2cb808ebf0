//! Channel bucketing of decoded events

use std::collections::BTreeMap;

use super::decoder::Event;

/// Group events by channel number
///
/// With `channel_list`, events on other channels are dropped. Events keep
/// their decode order within each channel.
pub fn sort_events_by_channel<I>(events: I, channel_list: Option<&[u8]>) -> BTreeMap<u8, Vec<Event>>
where
    I: IntoIterator<Item = Event>,
{
    let mut out: BTreeMap<u8, Vec<Event>> = BTreeMap::new();
    for event in events {
        if let Some(list) = channel_list {
            if !list.contains(&event.channel) {
                continue;
            }
        }
        out.entry(event.channel).or_default().push(event);
    }
    out
}
