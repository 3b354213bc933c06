use super::*;

fn opts(format: CacheFormat) -> FfmpegOpts {
    FfmpegOpts {
        out_path: PathBuf::from("out/final.mp4"),
        overwrite: true,
        width: 64,
        height: 36,
        fps: Fps::new(30, 1).unwrap(),
        format,
    }
}

fn track(id: &str, start: f64, end: f64) -> AudioTrack {
    AudioTrack {
        id: id.to_string(),
        path: PathBuf::from(format!("/media/{id}.mp3")),
        start,
        end,
        ss: 0.0,
        to: None,
        volume: 1.0,
        speed: 1.0,
        looping: false,
        fade_in: 0.0,
        fade_out: 0.0,
    }
}

fn joined(s: &FfmpegSynthesis) -> String {
    s.command_args().join(" ")
}

#[test]
fn opts_validation_catches_bad_values() {
    let mut o = opts(CacheFormat::Raw);
    o.validate().unwrap();
    o.width = 63;
    assert!(o.validate().is_err());
    o.width = 0;
    assert!(o.validate().is_err());
}

#[test]
fn raw_input_without_audio() {
    let mut s = FfmpegSynthesis::new(opts(CacheFormat::Raw));
    s.set_duration(2.5);
    let args = joined(&s);
    assert!(args.starts_with("-y -loglevel error -f rawvideo -pix_fmt rgba -s 64x36 -r 30/1 -i pipe:0"));
    assert!(args.contains(" -an "));
    assert!(args.contains("-t 2.500"));
    assert!(args.ends_with("out/final.mp4"));
}

#[test]
fn encoded_inputs_use_image_pipe() {
    let png = joined(&FfmpegSynthesis::new(opts(CacheFormat::Png)));
    assert!(png.contains("-f image2pipe -c:v png"));
    let jpg = joined(&FfmpegSynthesis::new(opts(CacheFormat::Jpg)));
    assert!(jpg.contains("-f image2pipe -c:v mjpeg"));
}

#[test]
fn audio_tracks_become_inputs_and_a_mix() {
    let mut s = FfmpegSynthesis::new(opts(CacheFormat::Raw));
    let mut bgm = track("bgm", 0.0, 10.0);
    bgm.looping = true;
    bgm.fade_out = 2.0;
    let mut voice = track("voice", 4.0, 7.0);
    voice.ss = 1.5;
    voice.to = Some(6.0);
    voice.volume = 0.5;
    s.add_audios(vec![bgm, voice]);

    let args = s.command_args();
    let line = args.join(" ");
    assert!(line.contains("-stream_loop -1 -i /media/bgm.mp3"));
    assert!(line.contains("-ss 1.500 -to 6.000 -i /media/voice.mp3"));
    assert!(line.contains("-map 0:v -map [aout] -c:a aac"));
    assert!(!line.contains(" -an "));

    let graph = &args[args.iter().position(|a| a == "-filter_complex").unwrap() + 1];
    assert!(graph.contains("[1:a]atrim=duration=10.000"));
    assert!(graph.contains("afade=t=out:st=8.000:d=2.000"));
    assert!(graph.contains("[2:a]atrim=duration=3.000"));
    assert!(graph.contains("volume=0.5"));
    assert!(graph.contains("adelay=4000|4000[a1]"));
    assert!(graph.ends_with("[a0][a1]amix=inputs=2:duration=longest:dropout_transition=0:normalize=0[aout]"));
}

#[test]
fn speed_is_split_into_supported_tempo_steps() {
    assert_eq!(atempo_chain(1.5), vec![1.5]);
    assert_eq!(atempo_chain(5.0), vec![2.0, 2.0, 1.25]);
    assert_eq!(atempo_chain(0.25), vec![0.5, 0.5]);

    let mut fast = track("fast", 0.0, 2.0);
    fast.speed = 4.0;
    let graph = audio_filter_graph(&[fast]);
    assert!(graph.contains("atrim=duration=8.000"));
    assert!(graph.contains("atempo=2,atempo=2"));
}
