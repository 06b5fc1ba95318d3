#![no_main]

use libfuzzer_sys::fuzz_target;
use stopify::catalog::BundledCatalog;
use stopify::config::MemoryQueueStore;
use stopify::core::PlayerCore;
use stopify::dates::MonthTable;
use stopify::model::SortOrder;
use stopify::tags::{CategoryMap, TagGroup};

fuzz_target!(|data: &[u8]| {
    let mut core = PlayerCore::new(
        Box::new(MemoryQueueStore::new()),
        CategoryMap::bundled(),
        MonthTable::default(),
    );
    core.load_catalog(&mut BundledCatalog);
    let count = core.songs.len().max(1);

    for pair in data.chunks(2) {
        let arg = usize::from(pair.get(1).copied().unwrap_or_default());
        let pick = core.songs.get(arg % count).cloned();
        match pair[0] % 16 {
            0 => core.play_next(),
            1 => core.play_previous(),
            2 => core.toggle_shuffle(),
            3 => core.cycle_repeat(),
            4 => {
                let _ = core.on_track_ended();
            }
            5 => {
                if let Some(song) = &pick {
                    core.add_to_queue(song);
                }
            }
            6 => {
                core.remove_from_queue(arg % 8);
            }
            7 => {
                core.reorder_queue(arg % 8, arg / 8 % 8);
            }
            8 => {
                if let Some(song) = &pick {
                    core.select_song(song);
                }
            }
            9 => core.play_queue_item(arg % 8),
            10 => {
                let group = TagGroup::ALL[arg % TagGroup::ALL.len()];
                let tag = pick.as_ref().and_then(|song| song.tags.first().cloned());
                core.set_filter(group, tag.as_deref());
            }
            11 => core.set_search_query(&format!("{}", arg % 30)),
            12 => {
                let mut sort = SortOrder::Catalog;
                for _ in 0..arg % 7 {
                    sort = sort.next();
                }
                core.set_sort(sort);
            }
            13 => {
                core.request_clear_queue();
                if arg % 2 == 0 {
                    core.confirm_clear_queue();
                } else {
                    core.cancel_clear_queue();
                }
            }
            14 => core.toggle_play(),
            _ => core.on_sink_error(arg as i32),
        }

        assert!(!(core.is_shuffled() && core.repeat_mode().is_on()));
        if let Some(current) = &core.current {
            assert!(core.songs.iter().any(|song| song.id == current.id));
        }
    }
});
