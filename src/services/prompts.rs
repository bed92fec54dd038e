//! 发给模型的提示词（葡萄牙语，与文档语言一致）

pub const EXTRACT_EXAMS: &str = "Você é um assistente de extração de dados altamente preciso.
Sua tarefa é extrair a lista de nomes de exames de um texto.
Considere como exame qualquer linha que contenha uma lista clara de exames ou procedimentos realizados, linhas no formato 'NOME DO EXAME - DATA',
ou qualquer header do tipo '## NOME DO EXAME'. Extraia o nome do exame do header, ignorando o prefixo '##' e espaços.
Nesses casos, extraia apenas o nome antes do hífen como exame.
Se o texto não contiver uma lista clara de exames ou procedimentos, retorne uma lista vazia.
Não infira exames a partir de menções genéricas como 'exame de sangue'.
Responda APENAS com um objeto JSON válido, sem nenhum texto adicional antes ou depois.
O formato do JSON deve ser: {\"exames\": [\"<exame1>\", \"<exame2>\"]}.
Se nenhum exame for encontrado, use uma lista vazia [] para a chave \"exames\".
Não invente exames e ignore informações irrelevantes.
Retorne os nomes dos exames em caixa alta.";

pub const EXTRACT_CPF: &str = "Você é um assistente de extração de dados altamente preciso.
Sua tarefa é extrair o CPF (apenas números, sem pontuação) de um texto.
ATENÇÃO: Se houver um CPF imediatamente após uma sigla de UF (por exemplo, CE/67495788372, SP/12345678901, etc),
você DEVE priorizar e retornar esse CPF, ignorando outros CPFs que possam aparecer no texto.
Se houver mais de um padrão UF/CPF, retorne o primeiro que aparecer.
Se não houver nenhum CPF após UF, aí sim retorne o primeiro CPF de 11 dígitos encontrado.
Responda APENAS com um objeto JSON válido, sem nenhum texto adicional antes ou depois.
O formato do JSON deve ser: {\"cpf\": \"<cpf_extraido>\"}.
Se o CPF não for encontrado, use o valor null para a chave \"cpf\".";

pub const EXTRACT_ALL_CPFS: &str = "Você é um assistente de extração de dados altamente preciso.
Sua tarefa é extrair TODOS os CPFs (apenas números, sem pontuação) de um texto.
Retorne uma lista de CPFs encontrados.
Responda APENAS com um objeto JSON válido, sem nenhum texto adicional antes ou depois.
O formato do JSON deve ser: {\"cpfs\": [\"<cpf1>\", \"<cpf2>\"]}.
Se nenhum CPF for encontrado, use uma lista vazia [] para a chave \"cpfs\".";

pub const COMPARE_SYSTEM: &str = "Você é um assistente que compara exames e retorna JSON.";

/// 输入文档文本
pub fn document_text(markdown: &str) -> String {
    format!("Texto:\n{}", markdown)
}

/// 比对提示词
///
/// 两个列表以 JSON 数组形式各占一行，标签固定为
/// `Exames Obrigatórios:` 和 `Exames Recebidos:`。
pub fn compare_exams(synonym_context: &[String], required: &[String], sent: &[String]) -> String {
    let context = if synonym_context.is_empty() {
        String::new()
    } else {
        format!(
            "Para te ajudar na análise, considere a seguinte lista de exames e seus possíveis \
             sinônimos e variações que encontramos em nossa base:\n{}\n",
            synonym_context.join(", ")
        )
    };

    format!(
        r#"Você é um assistente especializado em analisar exames médicos.
Sua tarefa é comparar a lista de 'Exames Obrigatórios' com a lista de 'Exames Recebidos' e determinar quais obrigatórios foram encontrados.

{context}
Use o contexto acima para entender possíveis variações de nomes. Um exame recebido pode satisfazer um obrigatório mesmo que os nomes não sejam idênticos (ex: 'Hemograma', 'Hemograma Completo' e 'Hemograma com Plaquetas').

Considere também que um exame mais abrangente pode cobrir exames mais específicos (ex: 'Colesterol Total' pode ser considerado encontrado se 'COLESTEROL HDL' e 'COLESTEROL LDL' forem encontrados).

Listas para análise:
- Exames Obrigatórios: {required}
- Exames Recebidos: {sent}

Gere um array JSON de objetos, um para cada exame obrigatório, com os seguintes campos:
- "exame": O nome do exame obrigatório.
- "status": Pode ser "encontrado", "faltante", ou "extra_no_ocr".
    - "encontrado": O exame foi encontrado e corresponde ao esperado.
    - "faltante": O exame era esperado, mas não foi encontrado.
    - "extra_no_ocr": O exame foi encontrado no documento, mas não estava na lista de exames obrigatórios.
- "justificativa": Uma breve explicação sobre o status do exame.

Além disso, identifique quaisquer exames na lista de 'Exames Recebidos' que não correspondam a nenhum 'Exame Obrigatório' e inclua-os no array JSON com o status "extra_no_ocr".

Exemplo de saída esperada:
[
    {{"exame": "CLÍNICO OCUPACIONAL", "status": "faltante", "justificativa": "O exame 'CLÍNICO OCUPACIONAL' não foi encontrado na lista de exames recebidos."}},
    {{"exame": "LDL", "status": "encontrado", "justificativa": "'LDL' foi encontrado na lista de exames recebidos como 'COLESTEROL LDL'."}},
    {{"exame": "EXAME_EXTRA_1", "status": "extra_no_ocr", "justificativa": "Este exame foi encontrado no documento, mas não está previsto na lista de exames obrigatórios."}}
]"#,
        context = context,
        required = json_list(required),
        sent = json_list(sent),
    )
}

fn json_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_prompt_lists_are_single_line_json() {
        let prompt = compare_exams(
            &["HEMOGRAMA".to_string(), "HEMOGRAMA COMPLETO".to_string()],
            &["HEMOGRAMA COMPLETO".to_string()],
            &["HEMOGRAMA".to_string()],
        );
        assert!(prompt.contains("- Exames Obrigatórios: [\"HEMOGRAMA COMPLETO\"]\n"));
        assert!(prompt.contains("- Exames Recebidos: [\"HEMOGRAMA\"]\n"));
        assert!(prompt.contains("HEMOGRAMA, HEMOGRAMA COMPLETO"));
    }

    #[test]
    fn test_compare_prompt_without_context() {
        let prompt = compare_exams(&[], &[], &[]);
        assert!(!prompt.contains("Para te ajudar"));
        assert!(prompt.contains("- Exames Obrigatórios: []"));
    }
}
