use std::path::PathBuf;

use autocut_processing::{plan_video_segments, renumber, select, SelectionWindow};
use autocut_timeline::{compose_srt, RejectionSet, Segment, Timeline};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("fixtures")
        .join(name)
}

fn retime_fixture() -> String {
    let timeline = Timeline::load(&fixture("lecture.srt")).expect("fixture subtitles should parse");
    let rejections =
        RejectionSet::load(&fixture("fillers.txt")).expect("fixture fillers should load");
    let selection = select(
        timeline.entries(),
        SelectionWindow::full(timeline.len()),
        &rejections,
    )
    .expect("full window is valid");
    compose_srt(&renumber(&selection.retained))
}

#[test]
fn lecture_fixture_retimes_to_known_output() {
    let expected = "\
1
00:00:00,000 --> 00:00:02,400
大家好，今天我们来讲一下所有权

2
00:00:02,400 --> 00:00:06,050
Rust 的每个值都有一个所有者

3
00:00:06,050 --> 00:00:08,855
当所有者离开作用域
这个值就会被丢弃

4
00:00:08,855 --> 00:00:12,175
接下来看借用

5
00:00:12,175 --> 00:00:12,175
啊

6
00:00:12,175 --> 00:00:15,525
引用必须总是有效的

7
00:00:15,525 --> 00:00:20,000
我们用一个例子来说明

8
00:00:20,000 --> 00:00:23,500
这就是今天的内容

";
    assert_eq!(retime_fixture(), expected);
}

#[test]
fn retiming_is_byte_identical_across_runs() {
    let first = retime_fixture();
    for _ in 0..5 {
        assert_eq!(retime_fixture(), first);
    }
}

#[test]
fn retimed_output_reparses_with_contiguous_cues() {
    let reparsed = Timeline::parse_srt(&retime_fixture()).expect("output should parse");
    let entries = reparsed.entries();
    assert_eq!(entries.len(), 8);
    assert_eq!(entries[0].start, 0.0);
    for pair in entries.windows(2) {
        assert_eq!(pair[0].end, pair[1].start);
    }
}

#[test]
fn lecture_fixture_video_segments_merge() {
    let timeline = Timeline::load(&fixture("lecture.srt")).expect("fixture subtitles should parse");
    let rejections =
        RejectionSet::load(&fixture("fillers.txt")).expect("fixture fillers should load");
    let selection = select(
        timeline.entries(),
        SelectionWindow::full(timeline.len()),
        &rejections,
    )
    .expect("full window is valid");

    let merged = plan_video_segments(&renumber(&selection.retained), 0.5);
    assert_eq!(
        merged,
        vec![
            Segment::new(0.0, 2.4),
            Segment::new(3.1, 10.005),
            Segment::new(11.0, 14.32),
            Segment::new(14.9, 18.25),
            Segment::new(19.4, 27.5),
        ]
    );
}
