//! Built-in legal-consultation rules for a fresh store.

use parley_core::error::StoreError;
use parley_core::rule::NewRule;
use parley_core::store::RuleStore;
use tracing::info;

pub fn default_rules() -> Vec<NewRule> {
    vec![
        NewRule::new(
            vec![r"借款.*诉讼时效".into(), r"欠钱.*多久.*起诉".into()],
            "根据《民法典》第一百八十八条，向人民法院请求保护民事权利的诉讼时效期间为三年。诉讼时效期间自权利人知道或者应当知道权利受到损害以及义务人之日起计算。",
            "《民法典》第一百八十八条",
        ),
        NewRule::new(
            vec![r"利息.*上限".into(), r"高利贷.*标准".into(), r"年利率.*多少".into()],
            "根据最高人民法院规定，借贷双方约定的利率未超过合同成立时一年期贷款市场报价利率（LPR）四倍的，人民法院应予支持。超过部分不予保护。",
            "最高法《关于审理民间借贷案件适用法律若干问题的规定》",
        ),
        NewRule::new(
            vec![r"客服.*电话".into(), r"联系.*管理员".into(), r"人工.*服务".into()],
            "我们的法律援助热线是：400-888-8888。工作时间：周一至周五 9:00-18:00。",
            "平台服务指南",
        ),
        NewRule::new(
            vec![r"杀人.*判几年".into(), r"故意杀人.*刑期".into()],
            "根据《刑法》第二百三十二条，故意杀人的，处死刑、无期徒刑或者十年以上有期徒刑；情节较轻的，处三年以上十年以下有期徒刑。",
            "《刑法》第二百三十二条",
        ),
    ]
}

/// Insert [`default_rules`] when the store holds no rules. Returns how many were added.
pub async fn seed_if_empty(store: &dyn RuleStore) -> Result<usize, StoreError> {
    if !store.list_rules().await?.is_empty() {
        return Ok(0);
    }
    let rules = default_rules();
    let count = rules.len();
    for rule in rules {
        store.create_rule(rule).await?;
    }
    info!(count, "Seeded default rules");
    Ok(count)
}
