// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 进度输出 (Progress reporter)
//!
//! 单行刷新的 "N of total processed" 计数器, 写到标准输出。
//! 总帧数未知时 (计数遍历失败) 只输出已处理帧数。

use std::io::{self, Stdout, Write};

pub struct ProgressReporter<W: Write = Stdout> {
    enabled: bool,
    total: Option<u64>,
    current: u64,
    out: W,
}

impl ProgressReporter<Stdout> {
    pub fn stdout(enabled: bool, total: Option<u64>) -> Self {
        Self::new(io::stdout(), enabled, total)
    }

    /// 不输出任何内容
    pub fn disabled() -> Self {
        Self::stdout(false, None)
    }
}

impl<W: Write> ProgressReporter<W> {
    pub fn new(out: W, enabled: bool, total: Option<u64>) -> Self {
        Self {
            enabled,
            total,
            current: 0,
            out,
        }
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// 记录一帧已处理
    pub fn tick(&mut self) -> io::Result<()> {
        self.current += 1;
        self.print_line()
    }

    /// 输出最终计数 (零帧时也会输出 "0 of 0 processed")
    pub fn finish(&mut self) -> io::Result<()> {
        if self.current == 0 {
            self.print_line()?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn print_line(&mut self) -> io::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        match self.total {
            Some(total) => write!(self.out, "\r{} of {} processed", self.current, total)?,
            None => write!(self.out, "\r{} processed", self.current)?,
        }
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(reporter: ProgressReporter<Vec<u8>>) -> String {
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    #[test]
    fn test_counts_with_total() {
        let mut reporter = ProgressReporter::new(Vec::new(), true, Some(3));
        for _ in 0..3 {
            reporter.tick().unwrap();
        }
        reporter.finish().unwrap();
        assert_eq!(
            output(reporter),
            "\r1 of 3 processed\r2 of 3 processed\r3 of 3 processed"
        );
    }

    #[test]
    fn test_zero_frames_prints_zero_total() {
        let mut reporter = ProgressReporter::new(Vec::new(), true, Some(0));
        reporter.finish().unwrap();
        assert_eq!(output(reporter), "\r0 of 0 processed");
    }

    #[test]
    fn test_unknown_total() {
        let mut reporter = ProgressReporter::new(Vec::new(), true, None);
        reporter.tick().unwrap();
        assert_eq!(output(reporter), "\r1 processed");
    }

    #[test]
    fn test_disabled_is_silent() {
        let mut reporter = ProgressReporter::new(Vec::new(), false, Some(10));
        reporter.tick().unwrap();
        reporter.finish().unwrap();
        assert_eq!(reporter.current(), 1);
        assert!(output(reporter).is_empty());
    }
}
