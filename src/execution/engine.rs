use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::execution::adapter::VenueAdapter;
use crate::model::order::{OrderType, Side};
use crate::model::{
    ArbitrageDirection, ExecutionReport, OrderAck, OrderRequest, Scope, SignalAction, SpreadSignal,
    TradeFill, Venue,
};
use crate::position_ledger::{PositionLedger, RebalanceOrder};
use crate::risk::RateLimiter;

const ORDER_TIMEOUT: Duration = Duration::from_millis(800);

pub type FillHook = Arc<dyn Fn(TradeFill) + Send + Sync>;

/// Two-leg OPEN (taker + maker hedge), CLOSE, REBALANCE and FLATTEN
/// execution, plus the live-order gate (C8).
pub struct ExecutionEngine {
    adapters: HashMap<Venue, Arc<dyn VenueAdapter>>,
    rate_limiter: Arc<RateLimiter>,
    position_ledger: Arc<PositionLedger>,
    live_order_enabled: AtomicBool,
    on_fill: Option<FillHook>,
}

impl ExecutionEngine {
    pub fn new(
        adapters: HashMap<Venue, Arc<dyn VenueAdapter>>,
        rate_limiter: Arc<RateLimiter>,
        position_ledger: Arc<PositionLedger>,
        live_order_enabled: bool,
        on_fill: Option<FillHook>,
    ) -> Self {
        Self {
            adapters,
            rate_limiter,
            position_ledger,
            live_order_enabled: AtomicBool::new(live_order_enabled),
            on_fill,
        }
    }

    pub fn set_live_order_enabled(&self, enabled: bool) {
        self.live_order_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn live_order_enabled(&self) -> bool {
        self.live_order_enabled.load(Ordering::SeqCst)
    }

    fn adapter(&self, venue: Venue) -> Arc<dyn VenueAdapter> {
        self.adapters
            .get(&venue)
            .cloned()
            .expect("adapter registered for every venue")
    }

    pub async fn execute_signal(
        &self,
        symbol: &str,
        signal: &SpreadSignal,
        b_bid: Decimal,
        b_ask: Decimal,
        can_open: bool,
        max_position: Decimal,
        now_ms: i64,
    ) -> ExecutionReport {
        match signal.action {
            SignalAction::Hold => ExecutionReport::no_attempt(signal.reason.clone(), now_ms),
            SignalAction::Open | SignalAction::Close => {
                if !self.live_order_enabled() {
                    return ExecutionReport::no_attempt("live orders disabled", now_ms);
                }
                if signal.action == SignalAction::Open {
                    if !can_open {
                        return failed_report("risk gate forbids opening", now_ms);
                    }
                    if !self.position_ledger.can_open(symbol, max_position) {
                        return failed_report("maximum position reached", now_ms);
                    }
                    let direction = signal
                        .direction
                        .expect("OPEN signal always carries a direction");
                    self.open_batches(symbol, direction, &signal.batches, b_bid, b_ask, now_ms)
                        .await
                } else {
                    self.close_position(symbol, &signal.batches, now_ms).await
                }
            }
            SignalAction::Rebalance => failed_report("unknown action for execute_signal", now_ms),
        }
    }

    async fn open_batches(
        &self,
        symbol: &str,
        direction: ArbitrageDirection,
        batches: &[Decimal],
        b_bid: Decimal,
        b_ask: Decimal,
        now_ms: i64,
    ) -> ExecutionReport {
        let (a_side, b_side) = direction.sides();
        let mut report = ExecutionReport {
            attempted_orders: 0,
            success_orders: 0,
            failed_orders: 0,
            message: String::new(),
            order_ids: Vec::new(),
            timestamp_ms: now_ms,
        };

        for &qty in batches {
            let taker_req = OrderRequest {
                venue: Venue::A,
                symbol: symbol.to_string(),
                side: a_side,
                quantity: qty,
                order_type: OrderType::Market,
                price: None,
                reduce_only: false,
                post_only: false,
                tag: "open_taker".to_string(),
            };
            let taker_ack = self.submit(taker_req).await;
            report.attempted_orders += 1;
            let taker_ack = match taker_ack {
                Some(ack) if ack.success && ack.filled_quantity > Decimal::ZERO => ack,
                _ => {
                    report.failed_orders += 1;
                    continue;
                }
            };
            report.success_orders += 1;
            report.order_ids.push(taker_ack.order_id.clone());
            self.record_fill(symbol, Venue::A, &taker_ack, "open_taker", now_ms);

            let hedge_price = match b_side {
                Side::Buy => b_bid,
                Side::Sell => b_ask,
            };
            let hedge_req = OrderRequest {
                venue: Venue::B,
                symbol: symbol.to_string(),
                side: b_side,
                quantity: taker_ack.filled_quantity,
                order_type: OrderType::PostOnlyLimit,
                price: Some(hedge_price),
                reduce_only: false,
                post_only: true,
                tag: "open_hedge".to_string(),
            };
            report.attempted_orders += 1;
            match self.submit(hedge_req).await {
                Some(ack) if ack.success => {
                    report.success_orders += 1;
                    report.order_ids.push(ack.order_id.clone());
                    self.record_fill(symbol, Venue::B, &ack, "open_hedge", now_ms);
                }
                _ => report.failed_orders += 1,
            }
        }
        report
    }

    async fn close_position(&self, symbol: &str, batches: &[Decimal], now_ms: i64) -> ExecutionReport {
        let state = self.position_ledger.state(symbol);
        let close_qty = if batches.is_empty() {
            Decimal::ZERO
        } else {
            batches.iter().sum()
        };
        let mut orders = Vec::new();
        if state.leg_a != Decimal::ZERO {
            let qty = state.leg_a.abs().min(if close_qty > Decimal::ZERO { close_qty } else { state.leg_a.abs() });
            orders.push(RebalanceOrder {
                venue: Venue::A,
                side: Side::reducing(state.leg_a),
                quantity: qty,
            });
        }
        if state.leg_b != Decimal::ZERO {
            let qty = state.leg_b.abs().min(if close_qty > Decimal::ZERO { close_qty } else { state.leg_b.abs() });
            orders.push(RebalanceOrder {
                venue: Venue::B,
                side: Side::reducing(state.leg_b),
                quantity: qty,
            });
        }
        self.submit_reduce_only(symbol, &orders, now_ms).await
    }

    pub async fn execute_rebalance(&self, symbol: &str, orders: &[RebalanceOrder], now_ms: i64) -> ExecutionReport {
        if !self.live_order_enabled() {
            return ExecutionReport::no_attempt("live orders disabled", now_ms);
        }
        self.submit_reduce_only(symbol, orders, now_ms).await
    }

    pub async fn flatten_symbol(&self, symbol: &str, now_ms: i64) -> ExecutionReport {
        if !self.live_order_enabled() {
            return ExecutionReport::no_attempt("live orders disabled", now_ms);
        }
        let orders = self.position_ledger.build_flatten_orders(symbol);
        self.submit_reduce_only(symbol, &orders, now_ms).await
    }

    async fn submit_reduce_only(&self, symbol: &str, orders: &[RebalanceOrder], now_ms: i64) -> ExecutionReport {
        let mut report = ExecutionReport {
            attempted_orders: 0,
            success_orders: 0,
            failed_orders: 0,
            message: String::new(),
            order_ids: Vec::new(),
            timestamp_ms: now_ms,
        };
        for order in orders {
            if order.quantity <= Decimal::ZERO {
                continue;
            }
            let req = OrderRequest::reduce_only_market(order.venue, symbol, order.side, order.quantity, "rebalance");
            report.attempted_orders += 1;
            match self.submit(req).await {
                Some(ack) if ack.success && ack.filled_quantity > Decimal::ZERO => {
                    report.success_orders += 1;
                    report.order_ids.push(ack.order_id.clone());
                    self.record_fill(symbol, order.venue, &ack, "rebalance", now_ms);
                }
                _ => report.failed_orders += 1,
            }
        }
        report
    }

    async fn submit(&self, request: OrderRequest) -> Option<OrderAck> {
        let granted = self
            .rate_limiter
            .acquire(request.venue, Scope::Order, 1.0, ORDER_TIMEOUT)
            .await
            .unwrap_or(false);
        if !granted {
            return None;
        }
        let adapter = self.adapter(request.venue);
        let order_type = request.order_type;
        let requested = request.quantity;
        match adapter.place_order(request).await {
            Ok(mut ack) => {
                if ack.success && ack.filled_quantity <= Decimal::ZERO && order_type == OrderType::Market {
                    ack.filled_quantity = requested;
                }
                Some(ack)
            }
            Err(_) => None,
        }
    }

    fn record_fill(&self, symbol: &str, venue: Venue, ack: &OrderAck, tag: &str, now_ms: i64) {
        self.position_ledger.apply_fill(symbol, venue, ack.side, ack.filled_quantity);
        if let Some(hook) = &self.on_fill {
            hook(TradeFill {
                venue,
                symbol: symbol.to_string(),
                side: ack.side,
                quantity: ack.filled_quantity,
                price: ack.avg_price,
                order_id: ack.order_id.clone(),
                tag: tag.to_string(),
                timestamp_ms: now_ms,
            });
        }
    }
}

fn failed_report(message: &str, now_ms: i64) -> ExecutionReport {
    ExecutionReport {
        attempted_orders: 0,
        success_orders: 0,
        failed_orders: 1,
        message: message.to_string(),
        order_ids: Vec::new(),
        timestamp_ms: now_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::adapter::SimulatedAdapter;
    use crate::model::{ArbitrageDirection, SpreadSignal};
    use rust_decimal_macros::dec;

    fn engine_with(live: bool) -> ExecutionEngine {
        let mut adapters: HashMap<Venue, Arc<dyn VenueAdapter>> = HashMap::new();
        let a = Arc::new(SimulatedAdapter::new("a", dec!(0.05)));
        let b = Arc::new(SimulatedAdapter::new("b", dec!(0.05)));
        a.set_mid("BTC", dec!(100.0));
        b.set_mid("BTC", dec!(100.1));
        adapters.insert(Venue::A, a);
        adapters.insert(Venue::B, b);
        ExecutionEngine::new(
            adapters,
            Arc::new(RateLimiter::new()),
            Arc::new(PositionLedger::new()),
            live,
            None,
        )
    }

    fn open_signal(batches: Vec<Decimal>) -> SpreadSignal {
        SpreadSignal {
            action: SignalAction::Open,
            direction: Some(ArbitrageDirection::LongAShortB),
            edge_bps: dec!(6.0),
            zscore: dec!(2.0),
            threshold_bps: dec!(1.8),
            reason: "entry condition met".to_string(),
            batches,
            timestamp_ms: 0,
        }
    }

    #[tokio::test]
    async fn live_order_gate_blocks_everything_with_zero_attempts() {
        let engine = engine_with(false);
        let signal = open_signal(vec![dec!(0.001)]);
        let report = engine
            .execute_signal("BTC", &signal, dec!(99.9), dec!(100.2), true, dec!(0.1), 0)
            .await;
        assert_eq!(report.attempted_orders, 0);
        assert_eq!(report.message, "live orders disabled");
    }

    #[tokio::test]
    async fn open_batches_submits_taker_then_maker_hedge() {
        let engine = engine_with(true);
        let signal = open_signal(vec![dec!(0.001), dec!(0.002)]);
        let report = engine
            .execute_signal("BTC", &signal, dec!(99.9), dec!(100.2), true, dec!(0.1), 0)
            .await;
        assert_eq!(report.attempted_orders, 4);
        assert_eq!(report.success_orders, 4);
        let state = engine.position_ledger.state("BTC");
        assert_eq!(state.leg_a, dec!(0.003));
        assert_eq!(state.leg_b, dec!(-0.003));
    }

    #[tokio::test]
    async fn hold_signal_is_a_zero_attempt_report() {
        let engine = engine_with(true);
        let signal = SpreadSignal {
            action: SignalAction::Hold,
            direction: None,
            edge_bps: Decimal::ZERO,
            zscore: Decimal::ZERO,
            threshold_bps: Decimal::ZERO,
            reason: "insufficient edge".to_string(),
            batches: Vec::new(),
            timestamp_ms: 0,
        };
        let report = engine
            .execute_signal("BTC", &signal, dec!(99.9), dec!(100.2), true, dec!(0.1), 0)
            .await;
        assert_eq!(report.attempted_orders, 0);
        assert_eq!(report.message, "insufficient edge");
    }

    #[tokio::test]
    async fn cannot_open_when_risk_gate_closed() {
        let engine = engine_with(true);
        let signal = open_signal(vec![dec!(0.001)]);
        let report = engine
            .execute_signal("BTC", &signal, dec!(99.9), dec!(100.2), false, dec!(0.1), 0)
            .await;
        assert_eq!(report.failed_orders, 1);
        assert_eq!(report.message, "risk gate forbids opening");
    }
}
