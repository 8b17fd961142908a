// ==========================================
// 负库存分析系统 - 列名别名表
// ==========================================
// 源列名 → 规范列 的静态映射（多对一, 与顺序无关）
// 覆盖不同 ERP 导出版本/语言环境, 以及数据库容器的列名
// 版本号随别名表变化递增, 写入分析指纹
// ==========================================

/// 别名表版本
pub const ALIAS_TABLE_VERSION: u32 = 1;

/// 规范列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalColumn {
    Code,
    PalletId,
    Name,
    Warehouse,
    Quantity,
    ReportDate,
    SourceFile,
}

impl CanonicalColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalColumn::Code => "code",
            CanonicalColumn::PalletId => "pallet_id",
            CanonicalColumn::Name => "name",
            CanonicalColumn::Warehouse => "warehouse",
            CanonicalColumn::Quantity => "negative_quantity",
            CanonicalColumn::ReportDate => "report_date",
            CanonicalColumn::SourceFile => "source_file",
        }
    }
}

/// 别名表: (源列名, 规范列)
pub const COLUMN_ALIASES: &[(&str, CanonicalColumn)] = &[
    // 产品编码
    ("Código", CanonicalColumn::Code),
    ("Código Producto", CanonicalColumn::Code),
    ("Codigo", CanonicalColumn::Code),
    ("codigo", CanonicalColumn::Code),
    // 托盘号
    ("ID de Pallet", CanonicalColumn::PalletId),
    ("ID_Pallet", CanonicalColumn::PalletId),
    ("id_pallet", CanonicalColumn::PalletId),
    // 描述
    ("Nombre", CanonicalColumn::Name),
    ("Descripción", CanonicalColumn::Name),
    ("nombre", CanonicalColumn::Name),
    // 仓库
    ("Almacén", CanonicalColumn::Warehouse),
    ("Almacen", CanonicalColumn::Warehouse),
    ("Warehouse", CanonicalColumn::Warehouse),
    ("Ubicación", CanonicalColumn::Warehouse),
    ("Ubicacion", CanonicalColumn::Warehouse),
    ("almacen", CanonicalColumn::Warehouse),
    // 负库存数量
    ("Inventario Físico", CanonicalColumn::Quantity),
    ("Cantidad_Negativa", CanonicalColumn::Quantity),
    ("cantidad_negativa", CanonicalColumn::Quantity),
    // 报告日期 / 来源（数据库容器）
    ("Fecha_Reporte", CanonicalColumn::ReportDate),
    ("fecha_reporte", CanonicalColumn::ReportDate),
    ("Archivo_Origen", CanonicalColumn::SourceFile),
    ("archivo_origen", CanonicalColumn::SourceFile),
];

/// 无显式数量列时的候选列（按顺序取第一个命中）
pub const QUANTITY_FALLBACK_COLUMNS: &[&str] = &["Cantidad", "Qty", "Inventario", "Stock"];

/// 查找源列名对应的规范列
pub fn lookup(header: &str) -> Option<CanonicalColumn> {
    let header = header.trim();
    COLUMN_ALIASES
        .iter()
        .find(|(alias, _)| *alias == header)
        .map(|(_, column)| *column)
}
