//! The transform decision engine.
//!
//! [`decide`] is a pure function of the inspected [`StreamProfile`], the
//! requested [`OutputFormat`] and the viewer's [`PlayableSet`]. It performs
//! no I/O and never fails; a profile with no streams at all is treated
//! conservatively and transcoded.

use ts_core::{
    AudioCodec, Container, OutputFormat, PlayableSet, StreamDirective, StreamProfile,
    TransformAction, TransformPlan, VideoCodec,
};

/// Rationale used when the source is delivered untouched.
pub const NO_CONVERSION: &str = "no conversion needed";

/// Choose how a stream reaches the viewer.
pub fn decide(profile: &StreamProfile, format: OutputFormat, playable: &PlayableSet) -> TransformPlan {
    match format {
        OutputFormat::Mp3 => audio_extraction(profile),
        OutputFormat::Video => video_delivery(profile, playable),
    }
}

fn audio_extraction(profile: &StreamProfile) -> TransformPlan {
    let source = profile
        .audio
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "no audio".to_string());
    TransformPlan {
        action: TransformAction::Transcode,
        container: Container::Mp3,
        video: StreamDirective::Drop,
        audio: StreamDirective::Encode(AudioCodec::Mp3),
        rationale: format!("audio conversion from {source} to mp3"),
    }
}

fn video_delivery(profile: &StreamProfile, playable: &PlayableSet) -> TransformPlan {
    let malformed = profile.video.is_none() && profile.audio.is_none();
    let video_ok = profile.video.as_ref().map_or(true, |c| playable.accepts_video(c));
    let audio_ok = profile.audio.as_ref().map_or(true, |c| playable.accepts_audio(c));
    let container_ok = playable.accepts_container(&profile.container);

    if !malformed && video_ok && audio_ok && container_ok {
        return TransformPlan {
            action: TransformAction::Passthrough,
            container: profile.container.clone(),
            video: copy_or_drop(profile.video.is_some()),
            audio: copy_or_drop(profile.audio.is_some()),
            rationale: NO_CONVERSION.to_string(),
        };
    }

    let container = target_container(playable);

    if !malformed && video_ok && audio_ok {
        return TransformPlan {
            action: TransformAction::Remux,
            rationale: format!("container conversion from {} to {container}", profile.container),
            container,
            video: copy_or_drop(profile.video.is_some()),
            audio: copy_or_drop(profile.audio.is_some()),
        };
    }

    let video_target = target_video(playable);
    let audio_target = target_audio(playable);
    let mut conversions = Vec::new();

    let video = match &profile.video {
        Some(codec) if playable.accepts_video(codec) => StreamDirective::Copy,
        Some(codec) => {
            conversions.push(format!("video conversion from {codec} to {video_target}"));
            StreamDirective::Encode(video_target)
        }
        None if malformed => StreamDirective::Encode(video_target),
        None => StreamDirective::Drop,
    };
    let audio = match &profile.audio {
        Some(codec) if playable.accepts_audio(codec) => StreamDirective::Copy,
        Some(codec) => {
            conversions.push(format!("audio conversion from {codec} to {audio_target}"));
            StreamDirective::Encode(audio_target)
        }
        None if malformed => StreamDirective::Encode(audio_target),
        None => StreamDirective::Drop,
    };
    if malformed {
        conversions.push("no recognised streams, converting everything".to_string());
    }
    if profile.container != container {
        conversions.push(format!(
            "container conversion from {} to {container}",
            profile.container
        ));
    }

    TransformPlan {
        action: TransformAction::Transcode,
        container,
        video,
        audio,
        rationale: conversions.join(", "),
    }
}

fn copy_or_drop<C>(present: bool) -> StreamDirective<C> {
    if present {
        StreamDirective::Copy
    } else {
        StreamDirective::Drop
    }
}

fn target_container(playable: &PlayableSet) -> Container {
    playable.containers.first().cloned().unwrap_or(Container::Mkv)
}

fn target_video(playable: &PlayableSet) -> VideoCodec {
    playable.video_codecs.first().cloned().unwrap_or(VideoCodec::H264)
}

fn target_audio(playable: &PlayableSet) -> AudioCodec {
    playable.audio_codecs.first().cloned().unwrap_or(AudioCodec::Aac)
}
