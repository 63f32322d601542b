// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 标注渲染 (Annotator)
///
/// 在帧缓冲上原地绘制: 跟踪框边框 + 标签底色 + 跟踪ID文字。
/// 坐标截断为整数像素并裁剪到画面内; 非法框直接拒绝, 不会写入缓冲区。
use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::detection::TrackedBox;
use crate::error::{Error, Result};

/// 标签底色比文字宽出的像素
pub const LABEL_PAD_X: u32 = 3;
/// 标签底色比文字高出的像素
pub const LABEL_PAD_Y: u32 = 4;

/// 标注样式配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationStyle {
    /// 边框与标签底色 (RGB)
    pub box_color: [u8; 3],
    /// 文字颜色 (RGB)
    pub text_color: [u8; 3],
    /// TrueType 字体文件, 为空时使用内置点阵数字字体
    pub font_path: Option<PathBuf>,
    /// TrueType 字号 (像素)
    pub font_size: f32,
    /// 内置点阵字体放大倍数
    pub builtin_scale: u32,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            box_color: [0, 255, 0],
            text_color: [0, 0, 0],
            font_path: None,
            font_size: 14.0,
            builtin_scale: 1,
        }
    }
}

// ========== 字体 ==========

/// 5x7 点阵数字 (每行低5位, 高位在左)
const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
const GLYPH_ADVANCE: u32 = GLYPH_WIDTH + 1;

fn glyph(c: char) -> Option<[u8; 7]> {
    let rows = match c {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        _ => return None,
    };
    Some(rows)
}

/// 内置点阵字体最大放大倍数
pub const MAX_BUILTIN_SCALE: u32 = 16;

/// 标签字体
pub struct LabelFont {
    kind: FontKind,
}

enum FontKind {
    /// 内置点阵数字字体 (跟踪ID只包含数字), 倍数在 [1, MAX_BUILTIN_SCALE] 内
    Builtin { scale: u32 },
    /// TrueType 字体
    TrueType { font: FontVec, scale: PxScale },
}

impl LabelFont {
    /// 内置点阵字体, 倍数被限制在 [1, MAX_BUILTIN_SCALE]
    pub fn builtin(scale: u32) -> Self {
        Self {
            kind: FontKind::Builtin {
                scale: scale.clamp(1, MAX_BUILTIN_SCALE),
            },
        }
    }

    /// 根据样式加载字体: 配置了字体文件则读取, 否则使用内置字体
    pub fn from_style(style: &AnnotationStyle) -> Result<Self> {
        match &style.font_path {
            Some(path) => Self::load(path, style.font_size),
            None => Ok(Self::builtin(style.builtin_scale)),
        }
    }

    /// 从文件加载 TrueType 字体
    pub fn load(path: &Path, size: f32) -> Result<Self> {
        let data = fs::read(path).map_err(|e| Error::io(path, e))?;
        let font = FontVec::try_from_vec(data)
            .map_err(|e| Error::Font(format!("{}: {}", path.display(), e)))?;
        info!("✅ 标签字体已加载: {}", path.display());
        Ok(Self {
            kind: FontKind::TrueType {
                font,
                scale: PxScale::from(size),
            },
        })
    }

    /// 文字像素尺寸 (宽, 高)
    pub fn text_size(&self, text: &str) -> (u32, u32) {
        match &self.kind {
            FontKind::Builtin { scale } => {
                let n = text.chars().count() as u32;
                if n == 0 {
                    return (0, 0);
                }
                let width = n.saturating_mul(GLYPH_ADVANCE).saturating_sub(1);
                (width.saturating_mul(*scale), GLYPH_HEIGHT * scale)
            }
            FontKind::TrueType { font, scale } => text_size(*scale, font, text),
        }
    }

    /// 以 (x, y) 为左上角绘制文字, 超出画面的部分被裁剪
    pub fn draw(&self, frame: &mut RgbImage, color: Rgb<u8>, x: i32, y: i32, text: &str) {
        match &self.kind {
            FontKind::Builtin { scale } => {
                let s = *scale as i32;
                for (i, c) in text.chars().enumerate() {
                    let Some(rows) = glyph(c) else {
                        continue;
                    };
                    let gx = x + (i as u32 * GLYPH_ADVANCE) as i32 * s;
                    for (row, bits) in rows.iter().enumerate() {
                        for col in 0..GLYPH_WIDTH {
                            if bits & (0x10 >> col) == 0 {
                                continue;
                            }
                            let px = gx + col as i32 * s;
                            let py = y + row as i32 * s;
                            draw_filled_rect_mut(
                                frame,
                                Rect::at(px, py).of_size(*scale, *scale),
                                color,
                            );
                        }
                    }
                }
            }
            FontKind::TrueType { font, scale } => {
                draw_text_mut(frame, color, x, y, *scale, font, text);
            }
        }
    }
}

// ========== 坐标裁剪 ==========

/// 裁剪到画面内的整数像素框 (闭区间)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl PixelRect {
    /// 截断坐标并裁剪到 width × height 画面内
    ///
    /// 非有限值、左上/右下颠倒、完全在画面外的框返回 None
    pub fn clamp_from(tracked: &TrackedBox, width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        let coords = [tracked.x1, tracked.y1, tracked.x2, tracked.y2];
        if coords.iter().any(|v| !v.is_finite()) {
            return None;
        }
        if tracked.x1 > tracked.x2 || tracked.y1 > tracked.y2 {
            return None;
        }
        // 先用浮点坐标判断是否完全在画面外, 截断会把 (-1, 0) 区间的值变成 0
        if tracked.x2 < 0.0
            || tracked.y2 < 0.0
            || tracked.x1 >= width as f32
            || tracked.y1 >= height as f32
        {
            return None;
        }

        let (x1, y1, x2, y2) = (
            tracked.x1 as i32,
            tracked.y1 as i32,
            tracked.x2 as i32,
            tracked.y2 as i32,
        );
        let (max_x, max_y) = (width as i32 - 1, height as i32 - 1);

        Some(Self {
            x1: x1.clamp(0, max_x),
            y1: y1.clamp(0, max_y),
            x2: x2.clamp(0, max_x),
            y2: y2.clamp(0, max_y),
        })
    }

    pub fn width(&self) -> u32 {
        (self.x2 - self.x1 + 1) as u32
    }

    pub fn height(&self) -> u32 {
        (self.y2 - self.y1 + 1) as u32
    }

    fn rect(&self) -> Rect {
        Rect::at(self.x1, self.y1).of_size(self.width(), self.height())
    }
}

// ========== 标注器 ==========

/// 跟踪结果标注器
pub struct Annotator {
    box_color: Rgb<u8>,
    text_color: Rgb<u8>,
    font: LabelFont,
}

impl Default for Annotator {
    fn default() -> Self {
        let style = AnnotationStyle::default();
        Self {
            box_color: Rgb(style.box_color),
            text_color: Rgb(style.text_color),
            font: LabelFont::builtin(style.builtin_scale),
        }
    }
}

impl Annotator {
    pub fn new(style: &AnnotationStyle) -> Result<Self> {
        Ok(Self {
            box_color: Rgb(style.box_color),
            text_color: Rgb(style.text_color),
            font: LabelFont::from_style(style)?,
        })
    }

    /// 标注一帧的所有跟踪框, 返回实际绘制的数量
    pub fn annotate(&self, frame: &mut RgbImage, tracks: &[TrackedBox]) -> usize {
        tracks.iter().filter(|t| self.draw_box(frame, t)).count()
    }

    /// 绘制 1 像素边框, 再绘制一次标签
    ///
    /// 框被拒绝时返回 false, 帧保持不变
    pub fn draw_box(&self, frame: &mut RgbImage, tracked: &TrackedBox) -> bool {
        let (width, height) = frame.dimensions();
        let Some(rect) = PixelRect::clamp_from(tracked, width, height) else {
            debug!("跳过非法跟踪框: {:?}", tracked);
            return false;
        };

        draw_hollow_rect_mut(frame, rect.rect(), self.box_color);
        self.draw_label_at(frame, &rect, &tracked.label());
        true
    }

    /// 只绘制标签 (底色 + 跟踪ID), 锚定在框的左上角
    pub fn draw_label(&self, frame: &mut RgbImage, tracked: &TrackedBox) -> bool {
        let (width, height) = frame.dimensions();
        let Some(rect) = PixelRect::clamp_from(tracked, width, height) else {
            debug!("跳过非法跟踪框标签: {:?}", tracked);
            return false;
        };
        self.draw_label_at(frame, &rect, &tracked.label());
        true
    }

    fn draw_label_at(&self, frame: &mut RgbImage, rect: &PixelRect, label: &str) {
        let (tw, th) = self.font.text_size(label);
        let background = Rect::at(rect.x1, rect.y1).of_size(tw + LABEL_PAD_X, th + LABEL_PAD_Y);
        draw_filled_rect_mut(frame, background, self.box_color);
        self.font.draw(
            frame,
            self.text_color,
            rect.x1 + 1,
            rect.y1 + (LABEL_PAD_Y / 2) as i32,
            label,
        );
    }
}
