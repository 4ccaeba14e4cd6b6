//! Maps option sets to ffmpeg arguments.

use crate::options::{AudioOptions, MediaOptions, VideoOptions};

/// Arguments and output metadata for one requested output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArgs {
    /// Arguments placed before `-i <input>`.
    pub input_args: Vec<String>,
    /// Arguments placed before this output's path.
    pub output_args: Vec<String>,
    /// Extension of the output file, without the dot.
    pub extension: String,
}

/// Format names whose usual file extension differs from the name.
const EXTENSIONS: &[(&str, &str)] = &[
    ("matroska", "mkv"),
    ("mpegts", "ts"),
    ("ipod", "m4a"),
    ("adts", "aac"),
    ("image2", "png"),
];

/// Returns the file extension for an ffmpeg format name.
pub fn extension_for_format(format: &str) -> &str {
    EXTENSIONS
        .iter()
        .find(|(name, _)| *name == format)
        .map(|(_, ext)| *ext)
        .unwrap_or(format)
}

/// Builds the arguments of one output; `None` for image options.
pub fn build_output_args(options: &MediaOptions) -> Option<OutputArgs> {
    match options {
        MediaOptions::Audio(o) => Some(audio_args(o)),
        MediaOptions::Video(o) => Some(video_args(o)),
        MediaOptions::Image(_) => None,
    }
}

/// Builds the full argument list for one invocation producing every output.
///
/// `outputs` pairs each option set with the path its output is written to.
/// Input arguments come from the first option that supplies any.
pub fn build_command_args<'a, I>(input: &str, outputs: I) -> Vec<String>
where
    I: IntoIterator<Item = (&'a OutputArgs, &'a str)>,
{
    let outputs: Vec<_> = outputs.into_iter().collect();

    let mut args = vec!["-y".to_string()];
    if let Some((first, _)) = outputs.iter().find(|(o, _)| !o.input_args.is_empty()) {
        args.extend(first.input_args.iter().cloned());
    }
    args.extend(["-i".to_string(), input.to_string()]);

    for (output, path) in outputs {
        args.extend(output.output_args.iter().cloned());
        args.push(path.to_string());
    }
    args
}

fn push(args: &mut Vec<String>, flag: &str, value: impl ToString) {
    args.push(flag.to_string());
    args.push(value.to_string());
}

fn input_args(input_format: Option<&str>) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(format) = input_format {
        push(&mut args, "-f", format);
    }
    args
}

fn audio_args(o: &AudioOptions) -> OutputArgs {
    let mut args = Vec::new();
    if let Some(v) = &o.format {
        push(&mut args, "-f", v);
    }
    if let Some(v) = &o.seek {
        push(&mut args, "-ss", v);
    }
    if let Some(v) = &o.duration {
        push(&mut args, "-t", v);
    }
    if let Some(v) = &o.bitrate {
        push(&mut args, "-b:a", v);
    }
    if let Some(v) = &o.filters {
        push(&mut args, "-af", v);
    }
    if let Some(v) = &o.complex_filters {
        push(&mut args, "-filter_complex", v);
    }
    push(&mut args, "-c:a", o.codec.as_deref().unwrap_or("copy"));

    OutputArgs {
        input_args: input_args(o.input_format.as_deref()),
        output_args: args,
        extension: extension(o.ext.as_deref(), o.format.as_deref(), "mp3"),
    }
}

fn video_args(o: &VideoOptions) -> OutputArgs {
    let mut args = Vec::new();
    if let Some(v) = o.frames {
        push(&mut args, "-frames:v", v);
    }
    if let Some(v) = &o.format {
        push(&mut args, "-f", v);
    }
    if let Some(v) = &o.seek {
        push(&mut args, "-ss", v);
    }
    if let Some(v) = &o.duration {
        push(&mut args, "-t", v);
    }
    if let Some(v) = &o.audio_bitrate {
        push(&mut args, "-b:a", v);
    }
    if let Some(v) = &o.video_bitrate {
        push(&mut args, "-b:v", v);
    }
    if let Some(v) = &o.audio_filters {
        push(&mut args, "-af", v);
    }

    let pad = o.pad.as_ref().map(|p| format!("pad={}", p));
    let video_filters = match (o.video_filters.as_deref(), pad) {
        (Some(filters), Some(pad)) => Some(format!("{},{}", filters, pad)),
        (Some(filters), None) => Some(filters.to_string()),
        (None, pad) => pad,
    };
    if let Some(v) = video_filters {
        push(&mut args, "-vf", v);
    }

    if let Some(v) = &o.complex_filters {
        push(&mut args, "-filter_complex", v);
    }
    if let Some(v) = &o.aspect {
        push(&mut args, "-aspect", v);
    }
    if let Some(v) = o.fps {
        push(&mut args, "-r", v);
    }
    if let Some(v) = &o.size {
        push(&mut args, "-s", v);
    }
    push(&mut args, "-c:v", o.video_codec.as_deref().unwrap_or("copy"));
    push(&mut args, "-c:a", o.audio_codec.as_deref().unwrap_or("copy"));

    OutputArgs {
        input_args: input_args(o.input_format.as_deref()),
        output_args: args,
        extension: extension(o.ext.as_deref(), o.format.as_deref(), "mp4"),
    }
}

fn extension(ext: Option<&str>, format: Option<&str>, default_format: &str) -> String {
    match ext {
        Some(ext) => ext.trim_start_matches('.').to_string(),
        None => extension_for_format(format.unwrap_or(default_format)).to_string(),
    }
}
