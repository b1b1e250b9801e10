use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, OnceLock},
};

static METRICS: OnceLock<Mutex<MetricsState>> = OnceLock::new();

/// 余额查询结果分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BalanceOutcome {
    Ok,
    /// RPC 或价格源失败，返回了零值结果
    Degraded,
    Timeout,
}

impl BalanceOutcome {
    fn as_str(self) -> &'static str {
        match self {
            BalanceOutcome::Ok => "ok",
            BalanceOutcome::Degraded => "degraded",
            BalanceOutcome::Timeout => "timeout",
        }
    }
}

#[derive(Default)]
struct MetricsState {
    balance_queries: BTreeMap<(String, BalanceOutcome), u64>,
    broadcasts: BTreeMap<(String, bool), u64>,
    unlock_failures: u64,
    // 上游 RPC 成功/失败与时延统计（毫秒）
    rpc_ok: u64,
    rpc_err: u64,
    rpc_latency_sum_ms: u128,
    // 简易直方图分桶（毫秒）：<50, <100, <250, <500, <1000, >=1000
    rpc_hist_buckets: [u64; 6],
}

fn state() -> MutexGuard<'static, MetricsState> {
    let lock = METRICS.get_or_init(|| Mutex::new(MetricsState::default()));
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(), // 避免因锁污染导致 panic
    }
}

pub fn observe_balance(chain: &str, outcome: BalanceOutcome) {
    *state()
        .balance_queries
        .entry((chain.to_string(), outcome))
        .or_insert(0) += 1;
}

pub fn inc_broadcast_success(chain: &str) {
    *state().broadcasts.entry((chain.to_string(), true)).or_insert(0) += 1;
}

pub fn inc_broadcast_fail(chain: &str) {
    *state().broadcasts.entry((chain.to_string(), false)).or_insert(0) += 1;
}

pub fn inc_unlock_failure() {
    state().unlock_failures += 1;
}

pub fn observe_rpc_latency_ms(latency_ms: u128, ok: bool) {
    let mut s = state();
    if ok {
        s.rpc_ok += 1;
    } else {
        s.rpc_err += 1;
    }
    s.rpc_latency_sum_ms += latency_ms;
    let b = if latency_ms < 50 {
        0
    } else if latency_ms < 100 {
        1
    } else if latency_ms < 250 {
        2
    } else if latency_ms < 500 {
        3
    } else if latency_ms < 1000 {
        4
    } else {
        5
    };
    s.rpc_hist_buckets[b] += 1;
}

pub fn render_prometheus() -> String {
    let s = state();
    let mut out = String::new();

    out.push_str("# HELP chainvault_balance_queries_total Balance queries per chain and outcome\n");
    out.push_str("# TYPE chainvault_balance_queries_total counter\n");
    for ((chain, outcome), v) in s.balance_queries.iter() {
        out.push_str(&format!(
            "chainvault_balance_queries_total{{chain=\"{}\",outcome=\"{}\"}} {}\n",
            chain,
            outcome.as_str(),
            v
        ));
    }

    out.push_str("# HELP chainvault_broadcasts_total Transaction broadcasts per chain\n");
    out.push_str("# TYPE chainvault_broadcasts_total counter\n");
    for ((chain, ok), v) in s.broadcasts.iter() {
        out.push_str(&format!(
            "chainvault_broadcasts_total{{chain=\"{}\",result=\"{}\"}} {}\n",
            chain,
            if *ok { "ok" } else { "fail" },
            v
        ));
    }

    out.push_str("# HELP chainvault_unlock_failures_total Failed wallet unlocks\n");
    out.push_str("# TYPE chainvault_unlock_failures_total counter\n");
    out.push_str(&format!(
        "chainvault_unlock_failures_total {}\n",
        s.unlock_failures
    ));

    out.push_str("# HELP chainvault_rpc_requests_total Upstream RPC requests\n");
    out.push_str("# TYPE chainvault_rpc_requests_total counter\n");
    out.push_str(&format!(
        "chainvault_rpc_requests_total{{result=\"ok\"}} {}\n",
        s.rpc_ok
    ));
    out.push_str(&format!(
        "chainvault_rpc_requests_total{{result=\"err\"}} {}\n",
        s.rpc_err
    ));

    out.push_str("# HELP chainvault_rpc_latency_ms_sum Sum of upstream RPC latency in ms\n");
    out.push_str("# TYPE chainvault_rpc_latency_ms_sum counter\n");
    out.push_str(&format!(
        "chainvault_rpc_latency_ms_sum {}\n",
        s.rpc_latency_sum_ms
    ));

    out.push_str("# HELP chainvault_rpc_latency_ms_bucket Upstream RPC latency histogram buckets\n");
    out.push_str("# TYPE chainvault_rpc_latency_ms_bucket histogram\n");
    let bounds = [50, 100, 250, 500, 1000];
    let mut cumulative = 0;
    for (i, bound) in bounds.iter().enumerate() {
        cumulative += s.rpc_hist_buckets[i];
        out.push_str(&format!(
            "chainvault_rpc_latency_ms_bucket{{le=\"{}\"}} {}\n",
            bound, cumulative
        ));
    }
    // +Inf 桶
    out.push_str(&format!(
        "chainvault_rpc_latency_ms_bucket{{le=\"+Inf\"}} {}\n",
        s.rpc_hist_buckets.iter().sum::<u64>()
    ));

    out
}
