//! 结果组装：累加器 + planner 成本 -> FinalResult（纯结构搬运，两级成本不合并）

use crate::accumulator::Accumulator;
use crate::model::FinalResult;

pub fn assemble(acc: Accumulator, unit_id: &str, planner_cost_usd: f64) -> FinalResult {
    FinalResult {
        run_id: acc.run_id,
        unit_id: unit_id.to_string(),
        category_records: acc.category_records,
        sources: acc.sources,
        cross_reference_result: acc.cross_reference,
        discovered_units: acc.discovered_units,
        planner_cost_usd,
        worker_cost_usd: acc.worker_cost,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, CategoryRecord};

    #[test]
    fn test_assemble_keeps_cost_tiers_separate() {
        let mut acc = Accumulator::new();
        let run_id = acc.run_id();
        acc.add_worker_cost(0.4);
        acc.set_record(CategoryRecord {
            category: Category::Quests,
            entities: Vec::new(),
            summary: "none yet".into(),
            source_urls: Vec::new(),
        });
        acc.add_discovered(["westfall".to_string()], "elwynn");

        let result = assemble(acc, "elwynn", 0.1);
        assert_eq!(result.run_id, run_id);
        assert_eq!(result.unit_id, "elwynn");
        assert_eq!(result.planner_cost_usd, 0.1);
        assert_eq!(result.worker_cost_usd, 0.4);
        assert!(result.category_records.contains_key(&Category::Quests));
        assert!(result.cross_reference_result.is_none());
        assert_eq!(result.discovered_units, ["westfall"]);
    }
}
