// ==========================================
// 市场主体关系引擎 - 通知决策引擎
// ==========================================
// 职责: 结合缺口分析结果与主体状态/角色,决定向哪些管理员发出覆盖缺口通知
// 输入: 全部主体 + 各售电商的区间读取结果 + 未识别主体编号 + 当前时间
// 输出: 通知事件序列 (不做跨次运行去重)
// 红线: 单个主体读取失败不得中断其他主体的评估
// ==========================================

use crate::domain::actor::{Actor, ActorId};
use crate::domain::interval::TimePoint;
use crate::domain::notification::NotificationEvent;
use crate::domain::relation::BalanceResponsibilityPeriod;
use crate::engine::continuity::CoverageGapAnalyzer;
use crate::engine::role_rules;
use std::collections::HashMap;
use std::fmt::Display;

/// 一次评估的结果
#[derive(Debug, Clone, Default)]
pub struct CoverageEvaluation {
    pub events: Vec<NotificationEvent>,
    /// 参与检查的售电商数量
    pub suppliers_checked: usize,
    /// 检出缺口的售电商编号
    pub suppliers_with_gap: Vec<String>,
    /// 关系读取失败 (按缺口处理) 的售电商编号
    pub read_failures: Vec<String>,
    /// 通知接收方数量
    pub notification_targets: usize,
}

// ==========================================
// NotificationDecisionEngine - 通知决策引擎
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct NotificationDecisionEngine {
    analyzer: CoverageGapAnalyzer,
}

impl NotificationDecisionEngine {
    pub fn new(analyzer: CoverageGapAnalyzer) -> Self {
        Self { analyzer }
    }

    /// 评估并生成通知事件
    ///
    /// # 参数
    /// - `all_actors`: 全部主体
    /// - `periods_by_actor`: 售电商ID → 区间读取结果;缺失视为无区间
    /// - `unrecognized_actor_numbers`: 无法解析的对方主体编号
    /// - `now`: 当前时间
    ///
    /// # 步骤
    /// 1. 通知目标 = Active 且持有管理员角色
    /// 2. 每个售电商: 读取失败或存在缺口 → 每个目标一条事件
    /// 3. 每个未识别编号 → 每个目标一条事件 (is_unrecognized = true)
    pub fn evaluate<E: Display>(
        &self,
        all_actors: &[Actor],
        periods_by_actor: &HashMap<ActorId, Result<Vec<BalanceResponsibilityPeriod>, E>>,
        unrecognized_actor_numbers: &[String],
        now: TimePoint,
    ) -> CoverageEvaluation {
        let targets: Vec<ActorId> = all_actors
            .iter()
            .filter(|a| role_rules::is_notification_target(a))
            .map(|a| a.id)
            .collect();

        let mut evaluation = CoverageEvaluation {
            notification_targets: targets.len(),
            ..Default::default()
        };

        for supplier in all_actors
            .iter()
            .filter(|a| role_rules::originates_balance_relations(a))
        {
            evaluation.suppliers_checked += 1;
            let supplier_number = supplier.actor_number.to_string();

            let has_gap = match periods_by_actor.get(&supplier.id) {
                Some(Ok(periods)) => self.analyzer.has_coverage_gap(periods, now),
                Some(Err(e)) => {
                    tracing::warn!(
                        "读取余额责任关系失败,按缺口处理: actor_number={}, error={}",
                        supplier_number,
                        e
                    );
                    evaluation.read_failures.push(supplier_number.clone());
                    true
                }
                None => false,
            };

            if has_gap {
                tracing::info!("检出余额责任覆盖缺口: actor_number={}", supplier_number);
                evaluation.suppliers_with_gap.push(supplier_number.clone());
                fan_out(&mut evaluation.events, &targets, &supplier_number, false, now);
            }
        }

        for number in unrecognized_actor_numbers {
            fan_out(&mut evaluation.events, &targets, number, true, now);
        }

        evaluation
    }
}

fn fan_out(
    events: &mut Vec<NotificationEvent>,
    targets: &[ActorId],
    affected_actor_number: &str,
    is_unrecognized: bool,
    now: TimePoint,
) {
    events.extend(targets.iter().map(|recipient| {
        NotificationEvent::coverage_gap(*recipient, affected_actor_number, is_unrecognized, now)
    }));
}
