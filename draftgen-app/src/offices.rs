//! 区域办事处静态表：按项目所在市镇补齐图签中的联系信息。

use draftgen_engine::record::AttributeRecord;
use tracing::info;

#[derive(Debug, Clone, Copy)]
pub struct Office {
    pub office: &'static str,
    pub address: &'static str,
    pub city_postal: &'static str,
    pub phone: &'static str,
}

const PATTERSON: Office = Office {
    office: "Alectra Patterson",
    address: "55 Patterson Road",
    city_postal: "Barrie, ON L4N 3V9",
    phone: "1-833-253-2872",
};
const CITYVIEW: Office = Office {
    office: "Alectra Cityview",
    address: "161 Cityview Blvd",
    city_postal: "Woodbridge, ON L4H 0A9",
    phone: "1-833-253-2872",
};
const KENNEDY: Office = Office {
    office: "Alectra Kennedy",
    address: "200 Kennedy Road South",
    city_postal: "Brampton, ON L6W 3G6",
    phone: "1-833-253-2872",
};
const SOUTHGATE: Office = Office {
    office: "Alectra Southgate",
    address: "395 Southgate Drive",
    city_postal: "Guelph, ON N1G 4Y1",
    phone: "1-519-822-3010",
};
const JOHN: Office = Office {
    office: "Alectra John",
    address: "55 John Street North",
    city_postal: "Hamilton, Ontario L8R 3M8",
    phone: "1-833-253-2872",
};

const MUNICIPALITIES: &[(&str, Office)] = &[
    ("Penetanguishene", PATTERSON),
    ("Barrie", PATTERSON),
    ("Thornton", PATTERSON),
    ("Alliston", PATTERSON),
    ("Beeton", PATTERSON),
    ("Tottenham", PATTERSON),
    ("Bradford West Gwillimbury", PATTERSON),
    ("Aurora", CITYVIEW),
    ("Vaughan", CITYVIEW),
    ("Richmond Hill", CITYVIEW),
    ("Markham", CITYVIEW),
    ("Brampton", KENNEDY),
    ("Mississauga", KENNEDY),
    ("Rockwood", SOUTHGATE),
    ("Guelph", SOUTHGATE),
    ("Hamilton", JOHN),
    ("St. Catharines", JOHN),
];

/// 市镇名查办事处，大小写不敏感。
pub fn office_for_municipality(name: &str) -> Option<&'static Office> {
    MUNICIPALITIES
        .iter()
        .find(|(municipality, _)| municipality.eq_ignore_ascii_case(name.trim()))
        .map(|(_, office)| office)
}

/// 按记录中的 `MUNICIPALITY` 把办事处信息写入记录（值统一大写）。
/// 未指定市镇时跳过；市镇无对应办事处时返回其名字供调用方报错。
pub fn enrich_with_office(record: &mut AttributeRecord) -> Result<(), String> {
    let Some(municipality) = record.get_display("MUNICIPALITY") else {
        info!("未指定市镇，跳过办事处信息补齐");
        return Ok(());
    };
    let office = office_for_municipality(&municipality).ok_or(municipality)?;
    record.set("OFFICE", office.office.to_uppercase());
    record.set("ADDRESS", office.address.to_uppercase());
    record.set("CITY_POSTAL", office.city_postal.to_uppercase());
    record.set("PHONE", office.phone.to_uppercase());
    Ok(())
}
