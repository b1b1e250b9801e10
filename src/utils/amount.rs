//! 金额换算：十进制字符串 ↔ 链上最小单位整数
//!
//! 余额展示保留 6 位小数

use std::str::FromStr;

use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};

use crate::error::{Result, WalletError};

/// 展示精度
pub const DISPLAY_DECIMALS: u32 = 6;

/// 十进制金额 → 最小单位 (wei / lamports)
///
/// 金额必须为正，小数位数不能超过链精度
pub fn parse_units(amount: &str, decimals: u32) -> Result<u128> {
    let value = Decimal::from_str(amount.trim())
        .map_err(|_| WalletError::InvalidAmount(amount.to_string()))?
        .normalize();

    if value <= Decimal::ZERO {
        return Err(WalletError::InvalidAmount(format!(
            "{} (must be positive)",
            amount
        )));
    }
    if value.scale() > decimals {
        return Err(WalletError::InvalidAmount(format!(
            "{} (more than {} decimal places)",
            amount, decimals
        )));
    }

    let mantissa = u128::try_from(value.mantissa())
        .map_err(|_| WalletError::InvalidAmount(amount.to_string()))?;
    10u128
        .checked_pow(decimals - value.scale())
        .and_then(|factor| mantissa.checked_mul(factor))
        .ok_or_else(|| WalletError::InvalidAmount(format!("{} (overflow)", amount)))
}

/// 最小单位 → 完整精度的十进制字符串（去掉末尾的 0）
pub fn format_units(value: u128, decimals: u32) -> String {
    let digits = value.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }

    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals - digits.len() + 1), digits)
    } else {
        digits
    };
    let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
    let frac_part = frac_part.trim_end_matches('0');

    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{}.{}", int_part, frac_part)
    }
}

/// 最小单位 → 展示用字符串（固定 6 位小数，四舍五入）
pub fn format_display(value: u128, decimals: u32) -> String {
    match to_decimal(value, decimals) {
        Some(d) => format!(
            "{:.prec$}",
            d.round_dp_with_strategy(DISPLAY_DECIMALS, RoundingStrategy::MidpointAwayFromZero),
            prec = DISPLAY_DECIMALS as usize
        ),
        // 超出 Decimal 范围时截断
        None => {
            let full = format_units(value, decimals);
            let (int_part, frac_part) = full.split_once('.').unwrap_or((full.as_str(), ""));
            let mut frac: String = frac_part.chars().take(DISPLAY_DECIMALS as usize).collect();
            while frac.len() < DISPLAY_DECIMALS as usize {
                frac.push('0');
            }
            format!("{}.{}", int_part, frac)
        }
    }
}

/// 最小单位 → 浮点（仅用于法币估值）
pub fn to_f64(value: u128, decimals: u32) -> f64 {
    match to_decimal(value, decimals) {
        Some(d) => d.to_f64().unwrap_or(0.0),
        None => value as f64 / 10f64.powi(decimals as i32),
    }
}

fn to_decimal(value: u128, decimals: u32) -> Option<Decimal> {
    let value = i128::try_from(value).ok()?;
    Decimal::try_from_i128_with_scale(value, decimals).ok()
}

/// 展示用的零余额
pub fn zero_display() -> String {
    format!("{:.prec$}", Decimal::ZERO, prec = DISPLAY_DECIMALS as usize)
}
