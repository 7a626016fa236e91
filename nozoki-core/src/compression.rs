//! ポインタ圧縮
//!
//! 圧縮ポインタはケージ（`1 << cage_bits` バイトの領域）内のオフセットです。
//! 展開には同じケージ内を指す非圧縮アドレス（ヒント）が必要です。

/// Smiタグのマスク（下位1ビットが0ならSmi）
pub const SMI_TAG_MASK: u64 = 1;

/// ポインタ圧縮の設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerCompression {
    /// 圧縮が有効か
    pub enabled: bool,
    /// ケージサイズのビット数（既定は32 = 4GiB）
    pub cage_bits: u32,
}

impl Default for PointerCompression {
    fn default() -> Self {
        Self {
            enabled: true,
            cage_bits: 32,
        }
    }
}

impl PointerCompression {
    /// 圧縮を行わない設定
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    fn offset_mask(&self) -> u64 {
        if self.cage_bits >= 64 {
            u64::MAX
        } else {
            (1u64 << self.cage_bits) - 1
        }
    }

    /// タグ付き値1つ分のサイズ（バイト）
    pub fn tagged_size(&self) -> u64 {
        if self.enabled {
            4
        } else {
            8
        }
    }

    /// アドレスが圧縮された形に見えるか
    pub fn is_compressed(&self, address: u64) -> bool {
        self.enabled && address & !self.offset_mask() == 0
    }

    /// アドレスをケージ内オフセットに圧縮する
    pub fn compress(&self, address: u64) -> u64 {
        if self.enabled {
            address & self.offset_mask()
        } else {
            address
        }
    }

    /// 圧縮アドレスを展開する
    ///
    /// `hint` は同じケージ内の非圧縮アドレスです。
    /// ヒントが0または自身が圧縮形の場合は展開できないため `None` を返します。
    pub fn decompress(&self, address: u64, hint: u64) -> Option<u64> {
        if !self.is_compressed(address) {
            return Some(address);
        }
        if hint == 0 || self.is_compressed(hint) {
            return None;
        }
        let mask = self.offset_mask();
        Some((hint & !mask) | (address & mask))
    }

    /// Smiタグ付きの値から整数値を取り出す
    ///
    /// 圧縮時は下位32ビットの31ビット値、非圧縮時は上位32ビットです。
    pub fn smi_value(&self, tagged: u64) -> i64 {
        if self.enabled {
            ((tagged as u32 as i32) >> 1) as i64
        } else {
            (tagged as i64) >> 32
        }
    }

    /// 整数値をSmiとしてタグ付けする（テストやスナップショット作成用）
    pub fn smi_tagged(&self, value: i64) -> u64 {
        if self.enabled {
            ((value as i32 as u32) << 1) as u64
        } else {
            (value as u64) << 32
        }
    }
}

/// 値がSmiタグを持つか
pub fn is_smi(tagged: u64) -> bool {
    tagged & SMI_TAG_MASK == 0
}

/// 既定の圧縮設定でアドレスが圧縮形に見えるか
pub fn is_pointer_compressed(address: u64) -> bool {
    PointerCompression::default().is_compressed(address)
}

/// 既定の圧縮設定で圧縮アドレスを展開する
pub fn decompress(address: u64, any_uncompressed_address: u64) -> Option<u64> {
    PointerCompression::default().decompress(address, any_uncompressed_address)
}
