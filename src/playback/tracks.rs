//! Engine-independent view of tracks and the user's track choices

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
    Text,
    Other,
}

/// Minimal capability view of one engine track format
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackFormat {
    pub id: String,
    pub bitrate: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f32>,
    pub channel_count: Option<u32>,
    pub language: Option<String>,
}

/// A group of alternative tracks as reported by the engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackGroup {
    pub group_id: String,
    pub kind: TrackKind,
    pub tracks: Vec<GroupTrack>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupTrack {
    pub format: TrackFormat,
    pub supported: bool,
    pub selected: bool,
}

impl TrackGroup {
    pub fn is_selected(&self) -> bool {
        self.tracks.iter().any(|t| t.selected)
    }

    /// Index of the first track the renderers can play, else 0
    pub fn first_supported_index(&self) -> usize {
        self.tracks.iter().position(|t| t.supported).unwrap_or(0)
    }

    fn selected_format(&self) -> Option<&TrackFormat> {
        self.tracks.iter().find(|t| t.selected).map(|t| &t.format)
    }
}

/// Pin selection of one group to one track
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackOverride {
    pub group_id: String,
    pub track_index: usize,
}

/// Override set handed to the engine; `None` leaves that kind automatic
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackOverrides {
    pub video: Option<TrackOverride>,
    pub audio: Option<TrackOverride>,
}

#[derive(Debug, Clone, PartialEq)]
struct ManualChoice {
    target: TrackOverride,
    bitrate: Option<u32>,
    /// Height for video, channel count for audio
    shape: Option<u32>,
}

/// Per-session track choices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackSelection {
    video: Option<ManualChoice>,
    audio: Option<ManualChoice>,
    forced_video: Option<TrackOverride>,
}

impl TrackSelection {
    /// Manually choose a track of `kind`; `None` returns that kind to Auto
    ///
    /// The other kind's manual choice is preserved.
    pub fn select(&mut self, groups: &[TrackGroup], kind: TrackKind, target: Option<TrackOverride>) {
        let choice = target.and_then(|target| {
            let group = groups.iter().find(|g| g.group_id == target.group_id)?;
            let format = &group.tracks.get(target.track_index)?.format;
            let shape = match kind {
                TrackKind::Video => format.height,
                _ => format.channel_count,
            };
            Some(ManualChoice {
                bitrate: format.bitrate,
                shape,
                target,
            })
        });

        match kind {
            TrackKind::Video => self.video = choice,
            TrackKind::Audio => self.audio = choice,
            TrackKind::Text | TrackKind::Other => {}
        }
    }

    pub fn set_forced_video(&mut self, target: TrackOverride) {
        self.forced_video = Some(target);
    }

    pub fn overrides(&self) -> TrackOverrides {
        TrackOverrides {
            video: self
                .video
                .as_ref()
                .map(|c| c.target.clone())
                .or_else(|| self.forced_video.clone()),
            audio: self.audio.as_ref().map(|c| c.target.clone()),
        }
    }

    fn is_auto(&self, kind: TrackKind) -> bool {
        match kind {
            TrackKind::Video => self.video.is_none(),
            TrackKind::Audio => self.audio.is_none(),
            TrackKind::Text | TrackKind::Other => true,
        }
    }

    fn matches(&self, kind: TrackKind, format: &TrackFormat) -> bool {
        let choice = match kind {
            TrackKind::Video => self.video.as_ref(),
            TrackKind::Audio => self.audio.as_ref(),
            TrackKind::Text | TrackKind::Other => None,
        };
        let shape = match kind {
            TrackKind::Video => format.height,
            _ => format.channel_count,
        };
        choice.is_some_and(|c| c.bitrate == format.bitrate && c.shape == shape)
    }
}

/// Override needed when video exists but the engine selected none of it
///
/// Some container formats are misclassified by engine heuristics, which then
/// silently play audio only.
pub fn missing_video_override(groups: &[TrackGroup]) -> Option<TrackOverride> {
    let mut video_groups = groups.iter().filter(|g| g.kind == TrackKind::Video).peekable();
    let first = (*video_groups.peek()?).clone();
    if video_groups.any(|g| g.is_selected()) {
        return None;
    }
    Some(TrackOverride {
        track_index: first.first_supported_index(),
        group_id: first.group_id,
    })
}

/// Entry of a quality/audio menu
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityItem {
    pub label: String,
    pub target: Option<TrackOverride>,
    pub is_auto: bool,
    pub is_selected: bool,
}

/// Menu for `kind`: "Auto" first, then every track of every group of that kind
pub fn quality_menu(groups: &[TrackGroup], kind: TrackKind, selection: &TrackSelection) -> Vec<QualityItem> {
    let label = |format: &TrackFormat| match kind {
        TrackKind::Video => video_label(format),
        _ => audio_label(format),
    };
    let is_auto = selection.is_auto(kind);
    let current = groups
        .iter()
        .filter(|g| g.kind == kind && g.is_selected())
        .find_map(|g| g.selected_format())
        .map(label);

    let mut items = vec![QualityItem {
        label: match (&current, is_auto) {
            (Some(current), true) => format!("Auto ({current})"),
            _ => "Auto".to_string(),
        },
        target: None,
        is_auto: true,
        is_selected: is_auto,
    }];

    for group in groups.iter().filter(|g| g.kind == kind) {
        for (index, track) in group.tracks.iter().enumerate() {
            items.push(QualityItem {
                label: label(&track.format),
                target: Some(TrackOverride {
                    group_id: group.group_id.clone(),
                    track_index: index,
                }),
                is_auto: false,
                is_selected: !is_auto && selection.matches(kind, &track.format),
            });
        }
    }
    items
}

pub fn video_label(format: &TrackFormat) -> String {
    let kbps = format.bitrate.filter(|b| *b > 0).map(|b| b / 1000).unwrap_or(0);
    let fps = format.frame_rate.filter(|f| *f > 0.0).map(|f| f as u32).unwrap_or(0);
    let height = format.height.unwrap_or(0);
    match (fps, kbps, height) {
        (fps, kbps, _) if fps > 0 && kbps > 0 => format!("{height}p ({fps}fps, {kbps} kbps)"),
        (_, kbps, _) if kbps > 0 => format!("{height}p ({kbps} kbps)"),
        (_, _, height) if height > 0 => format!("{height}p"),
        _ => "Unknown".to_string(),
    }
}

pub fn audio_label(format: &TrackFormat) -> String {
    let lang = format.language.as_deref().unwrap_or("und");
    let kbps = format.bitrate.filter(|b| *b > 0).map(|b| b / 1000).unwrap_or(0);
    let channels = format.channel_count.unwrap_or(0);
    match (kbps, channels) {
        (kbps, channels) if kbps > 0 && channels > 0 => format!("[{lang}] {kbps} kbps {channels}ch"),
        (kbps, _) if kbps > 0 => format!("[{lang}] {kbps} kbps"),
        _ => format!("[{lang}]"),
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_missing_video_override_picks_first_supported() {
        let groups = vec![
            group("audio", TrackKind::Audio, vec![audio_track(128_000, 2, "eng", true)]),
            group(
                "video",
                TrackKind::Video,
                vec![
                    video_track(5_000_000, 1080, false, false),
                    video_track(3_000_000, 720, true, false),
                ],
            ),
        ];
        assert_eq!(
            missing_video_override(&groups),
            Some(TrackOverride {
                group_id: "video".to_string(),
                track_index: 1
            })
        );
    }

    #[test]
    fn test_no_override_when_video_selected_or_absent() {
        let selected = vec![group(
            "video",
            TrackKind::Video,
            vec![video_track(3_000_000, 720, true, true)],
        )];
        assert_eq!(missing_video_override(&selected), None);

        let audio_only = vec![group("audio", TrackKind::Audio, vec![audio_track(96_000, 2, "eng", true)])];
        assert_eq!(missing_video_override(&audio_only), None);
    }

    #[test]
    fn test_labels() {
        let track = video_track(3_000_000, 720, true, false);
        assert_eq!(video_label(&track.format), "720p (25fps, 3000 kbps)");
        assert_eq!(
            video_label(&TrackFormat {
                height: Some(480),
                ..Default::default()
            }),
            "480p"
        );
        assert_eq!(video_label(&TrackFormat::default()), "Unknown");

        let audio = audio_track(128_000, 6, "deu", false);
        assert_eq!(audio_label(&audio.format), "[deu] 128 kbps 6ch");
        assert_eq!(audio_label(&TrackFormat::default()), "[und]");
    }

    #[test]
    fn test_manual_selection_preserves_other_kind() {
        let groups = vec![
            group(
                "video",
                TrackKind::Video,
                vec![
                    video_track(5_000_000, 1080, true, true),
                    video_track(3_000_000, 720, true, false),
                ],
            ),
            group(
                "audio",
                TrackKind::Audio,
                vec![audio_track(128_000, 2, "eng", true), audio_track(96_000, 2, "hin", false)],
            ),
        ];
        let mut selection = TrackSelection::default();
        let video_720 = TrackOverride {
            group_id: "video".to_string(),
            track_index: 1,
        };
        let audio_hin = TrackOverride {
            group_id: "audio".to_string(),
            track_index: 1,
        };

        selection.select(&groups, TrackKind::Video, Some(video_720.clone()));
        selection.select(&groups, TrackKind::Audio, Some(audio_hin.clone()));
        assert_eq!(
            selection.overrides(),
            TrackOverrides {
                video: Some(video_720.clone()),
                audio: Some(audio_hin.clone())
            }
        );

        let menu = quality_menu(&groups, TrackKind::Video, &selection);
        assert_eq!(menu[0].label, "Auto");
        assert!(!menu[0].is_selected);
        assert!(menu[2].is_selected);
        assert!(!menu[1].is_selected);

        selection.select(&groups, TrackKind::Video, None);
        assert_eq!(selection.overrides().video, None);
        assert_eq!(selection.overrides().audio, Some(audio_hin));

        let menu = quality_menu(&groups, TrackKind::Video, &selection);
        assert_eq!(menu[0].label, "Auto (1080p (25fps, 5000 kbps))");
        assert!(menu[0].is_selected);
    }

    #[test]
    fn test_manual_video_beats_forced() {
        let groups = vec![group(
            "video",
            TrackKind::Video,
            vec![video_track(5_000_000, 1080, true, false), video_track(3_000_000, 720, true, false)],
        )];
        let mut selection = TrackSelection::default();
        selection.set_forced_video(TrackOverride {
            group_id: "video".to_string(),
            track_index: 0,
        });
        assert_eq!(selection.overrides().video.unwrap().track_index, 0);

        selection.select(
            &groups,
            TrackKind::Video,
            Some(TrackOverride {
                group_id: "video".to_string(),
                track_index: 1,
            }),
        );
        assert_eq!(selection.overrides().video.unwrap().track_index, 1);
    }
}
