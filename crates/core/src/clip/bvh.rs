//! Reader for Biovision hierarchy (`.bvh`) motion capture files.

use std::sync::Arc;

use glam::Vec3;

use super::{Channel, Joint, LoadedClip, MotionClip, Skeleton};
use crate::{Result, StageError};

/// Deepest `JOINT` nesting accepted before the file is rejected.
pub const MAX_JOINT_DEPTH: usize = 256;

/// Parses a BVH document into a shared skeleton and clip.
#[tracing::instrument(skip(source), fields(bytes = source.len()))]
pub fn parse_bvh(name: &str, source: &str) -> Result<LoadedClip> {
    let mut parser = Parser::new(source);

    parser.expect("HIERARCHY")?;
    parser.expect("ROOT")?;
    let mut joints = Vec::new();
    let mut channel_count = 0;
    parser.joint(None, false, 0, &mut joints, &mut channel_count)?;
    let skeleton = Skeleton::new(joints)?;

    parser.expect("MOTION")?;
    parser.expect("Frames:")?;
    let frame_count = parser.usize()?;
    parser.expect("Frame")?;
    parser.expect("Time:")?;
    let frame_time = parser.f32()?;
    if !frame_time.is_finite() || frame_time <= 0.0 {
        return Err(StageError::parse(parser.line(), "frame time must be positive"));
    }

    if channel_count == 0 {
        return Err(StageError::parse(parser.line(), "hierarchy declares no channels"));
    }

    // The header count is untrusted; reserve no more rows than values remain.
    let mut frames = Vec::with_capacity(frame_count.min(parser.remaining() / channel_count));
    for _ in 0..frame_count {
        let mut row = Vec::with_capacity(channel_count);
        for _ in 0..channel_count {
            row.push(parser.f32()?);
        }
        frames.push(row);
    }

    let clip = MotionClip::new(name, frame_time, frames)?;
    tracing::debug!(
        joints = skeleton.joints().len(),
        frames = clip.frame_count(),
        duration = clip.duration(),
        "parsed bvh clip"
    );

    Ok(LoadedClip {
        skeleton: Arc::new(skeleton),
        clip: Arc::new(clip),
    })
}

struct Parser<'a> {
    tokens: Vec<(usize, &'a str)>,
    cursor: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        let tokens = source
            .lines()
            .enumerate()
            .flat_map(|(index, line)| line.split_whitespace().map(move |token| (index + 1, token)))
            .collect();
        Self { tokens, cursor: 0 }
    }

    fn remaining(&self) -> usize {
        self.tokens.len().saturating_sub(self.cursor)
    }

    /// Line of the most recently consumed token.
    fn line(&self) -> usize {
        self.cursor
            .checked_sub(1)
            .and_then(|index| self.tokens.get(index))
            .or_else(|| self.tokens.last())
            .map(|(line, _)| *line)
            .unwrap_or(1)
    }

    fn next(&mut self, expected: &str) -> Result<&'a str> {
        match self.tokens.get(self.cursor) {
            Some(&(_, token)) => {
                self.cursor += 1;
                Ok(token)
            }
            None => Err(StageError::parse(
                self.line(),
                format!("unexpected end of file, expected {expected}"),
            )),
        }
    }

    fn expect(&mut self, keyword: &str) -> Result<()> {
        let token = self.next(keyword)?;
        if token.eq_ignore_ascii_case(keyword) {
            Ok(())
        } else {
            Err(StageError::parse(
                self.line(),
                format!("expected `{keyword}`, found `{token}`"),
            ))
        }
    }

    fn f32(&mut self) -> Result<f32> {
        let token = self.next("a number")?;
        token
            .parse()
            .map_err(|_| StageError::parse(self.line(), format!("`{token}` is not a number")))
    }

    fn usize(&mut self) -> Result<usize> {
        let token = self.next("a count")?;
        token
            .parse()
            .map_err(|_| StageError::parse(self.line(), format!("`{token}` is not a count")))
    }

    fn vec3(&mut self) -> Result<Vec3> {
        Ok(Vec3::new(self.f32()?, self.f32()?, self.f32()?))
    }

    /// Reads one `ROOT`/`JOINT`/`End Site` block after its keyword.
    fn joint(
        &mut self,
        parent: Option<usize>,
        end_site: bool,
        depth: usize,
        joints: &mut Vec<Joint>,
        channel_count: &mut usize,
    ) -> Result<()> {
        if depth > MAX_JOINT_DEPTH {
            return Err(StageError::parse(self.line(), "joint hierarchy too deep"));
        }
        let name = if end_site {
            self.expect("Site")?;
            let parent_name = parent
                .and_then(|index| joints.get(index))
                .map(|joint| joint.name.as_str())
                .unwrap_or("root");
            format!("{parent_name}_end")
        } else {
            self.next("a joint name")?.to_string()
        };

        self.expect("{")?;
        let index = joints.len();
        joints.push(Joint {
            name,
            parent,
            offset: Vec3::ZERO,
            channels: Vec::new(),
            channel_offset: *channel_count,
        });

        loop {
            let token = self.next("`}`")?;
            match token {
                "OFFSET" => joints[index].offset = self.vec3()?,
                "CHANNELS" if !end_site => {
                    if !joints[index].channels.is_empty() || joints.len() > index + 1 {
                        return Err(StageError::parse(
                            self.line(),
                            "CHANNELS must come once, before child joints",
                        ));
                    }
                    let count = self.usize()?;
                    for _ in 0..count {
                        let channel_name = self.next("a channel name")?;
                        let channel = Channel::from_name(channel_name).ok_or_else(|| {
                            StageError::parse(
                                self.line(),
                                format!("unknown channel `{channel_name}`"),
                            )
                        })?;
                        joints[index].channels.push(channel);
                    }
                    *channel_count += count;
                }
                "JOINT" if !end_site => {
                    self.joint(Some(index), false, depth + 1, joints, channel_count)?
                }
                "End" if !end_site => {
                    self.joint(Some(index), true, depth + 1, joints, channel_count)?
                }
                "}" => return Ok(()),
                other => {
                    return Err(StageError::parse(
                        self.line(),
                        format!("unexpected `{other}` in joint block"),
                    ))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::fixtures::ARM_BVH;

    #[test]
    fn reads_hierarchy_and_motion() {
        let loaded = parse_bvh("arm", ARM_BVH).unwrap();
        let names: Vec<_> = loaded
            .skeleton
            .joints()
            .iter()
            .map(|joint| joint.name.as_str())
            .collect();

        assert_eq!(names, ["Hips", "Arm", "Arm_end"]);
        assert_eq!(loaded.skeleton.channel_count(), 9);
        assert_eq!(loaded.skeleton.joints()[1].channel_offset, 6);
        assert_eq!(loaded.skeleton.joints()[2].parent, Some(1));
        assert_eq!(loaded.clip.frame_count(), 3);
        assert!((loaded.clip.frame_time() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn reports_missing_values_with_line() {
        let truncated = ARM_BVH.trim_end().rsplit_once('\n').unwrap().0;
        let err = parse_bvh("arm", truncated).unwrap_err();
        assert!(matches!(err, StageError::Parse { .. }));
        assert!(err.to_string().contains("unexpected end of file"));
    }

    #[test]
    fn rejects_unknown_channels() {
        let broken = ARM_BVH.replace(
            "Zrotation Xrotation Yrotation\n    End",
            "Wrotation Xrotation Yrotation\n    End",
        );
        let err = parse_bvh("arm", &broken).unwrap_err();
        match err {
            StageError::Parse { line, message } => {
                assert_eq!(line, 9);
                assert!(message.contains("Wrotation"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn rejects_garbage_headers() {
        assert!(parse_bvh("x", "HELLO").is_err());
        assert!(parse_bvh("x", "").is_err());
    }

    #[test]
    fn oversized_frame_count_runs_out_of_values() {
        let source = "HIERARCHY
ROOT Hips
{
  OFFSET 0 0 0
  CHANNELS 1 Zrotation
}
MOTION
Frames: 100000000000000000
Frame Time: 0.1
0
";
        let err = parse_bvh("huge", source).unwrap_err();
        assert!(matches!(err, StageError::Parse { line: 10, .. }));
        assert!(err.to_string().contains("unexpected end of file"));
    }

    #[test]
    fn channel_free_hierarchy_is_rejected() {
        let source = "HIERARCHY
ROOT Hips
{
  OFFSET 0 0 0
}
MOTION
Frames: 100000000000000000
Frame Time: 0.1
";
        let err = parse_bvh("empty", source).unwrap_err();
        assert!(err.to_string().contains("no channels"));
    }

    #[test]
    fn deep_nesting_is_a_parse_error() {
        let depth = MAX_JOINT_DEPTH + 10;
        let mut source = String::from("HIERARCHY\nROOT j0\n{\nCHANNELS 1 Zrotation\n");
        for level in 1..=depth {
            source.push_str(&format!("JOINT j{level}\n{{\nCHANNELS 1 Zrotation\n"));
        }
        for _ in 0..=depth {
            source.push_str("}\n");
        }
        source.push_str("MOTION\nFrames: 1\nFrame Time: 0.1\n");

        let err = parse_bvh("deep", &source).unwrap_err();
        match err {
            StageError::Parse { message, .. } => assert!(message.contains("too deep")),
            other => panic!("unexpected error {other:?}"),
        }

        // The same shape within the limit still parses.
        let mut shallow = String::from("HIERARCHY\nROOT j0\n{\nCHANNELS 1 Zrotation\n");
        for level in 1..=8 {
            shallow.push_str(&format!("JOINT j{level}\n{{\nCHANNELS 1 Zrotation\n"));
        }
        for _ in 0..=8 {
            shallow.push_str("}\n");
        }
        shallow.push_str("MOTION\nFrames: 1\nFrame Time: 0.1\n");
        shallow.push_str(&"0 ".repeat(9));
        assert_eq!(parse_bvh("shallow", &shallow).unwrap().skeleton.joints().len(), 9);
    }
}
